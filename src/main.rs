#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    document_approval_server::run().await
}
