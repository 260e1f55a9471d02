#[actix_web::main]
async fn main() -> std::io::Result<()> {
    automation_hub_lib::run().await
}
