mod api;
mod clock;
mod host;
mod runner;
mod store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
