//! In-memory collaborators for use-case and handler tests.

use crate::domain::conversation::ChatMessage;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{CompletionOptions, LLMConfig};
use crate::domain::review::DryRunResult;
use crate::domain::test_case::TestCaseSpec;
use crate::infrastructure::codebeamer::TestCaseFetcher;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::syntax_checker::SyntaxChecker;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Replays scripted replies in order, then the fallback. Records every prompt.
pub struct StubLlm {
    replies: Mutex<VecDeque<Result<String>>>,
    fallback: Result<String>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl StubLlm {
    pub fn always(reply: &str) -> Self {
        Self::scripted(Vec::new(), Ok(reply.to_string()))
    }

    pub fn failing(err: AppError) -> Self {
        Self::scripted(Vec::new(), Err(err))
    }

    pub fn scripted(replies: Vec<Result<String>>, fallback: Result<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMClient for StubLlm {
    async fn complete(
        &self,
        _config: &LLMConfig,
        messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }

    /// Emits the next reply one word at a time.
    async fn stream(
        &self,
        config: &LLMConfig,
        messages: &[ChatMessage],
        options: &CompletionOptions,
        on_chunk: &mut (dyn FnMut(String) + Send),
    ) -> Result<String> {
        let reply = self.complete(config, messages, options).await?;
        for piece in reply.split_inclusive(' ') {
            on_chunk(piece.to_string());
        }
        Ok(reply)
    }

    async fn list_models(&self, _config: &LLMConfig) -> Result<Vec<String>> {
        match &self.fallback {
            Ok(_) => Ok(vec!["llama3:8b".to_string(), "qwen3:8b".to_string()]),
            Err(e) => Err(e.clone()),
        }
    }
}

#[derive(Default)]
pub struct StubFetcher {
    specs: HashMap<String, TestCaseSpec>,
}

impl StubFetcher {
    pub fn with(specs: Vec<TestCaseSpec>) -> Self {
        Self {
            specs: specs.into_iter().map(|spec| (spec.id.clone(), spec)).collect(),
        }
    }
}

#[async_trait]
impl TestCaseFetcher for StubFetcher {
    async fn fetch(&self, test_case_id: &str) -> Option<TestCaseSpec> {
        self.specs.get(test_case_id).cloned()
    }
}

pub struct StubChecker(pub Result<DryRunResult>);

#[async_trait]
impl SyntaxChecker for StubChecker {
    async fn check(&self, _script: &str) -> Result<DryRunResult> {
        self.0.clone()
    }
}

pub fn spec(id: &str, name: &str) -> TestCaseSpec {
    TestCaseSpec {
        id: id.to_string(),
        name: name.to_string(),
        steps: "Send wakeup frame".to_string(),
        expected: "ECU awake".to_string(),
        ..Default::default()
    }
}

/// Serves `body` as a JSON 200 to every request on a local port and returns the base URL.
pub async fn serve_json(body: &str) -> String {
    serve(body, "application/json").await
}

/// Same as [`serve_json`] with an arbitrary content type, for streamed provider replies.
pub async fn serve(body: &str, content_type: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    );
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let response = response.clone();
            tokio::spawn(async move {
                read_request(&mut socket).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{}", addr)
}

async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
        let body_len = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + body_len {
            return;
        }
    }
}
