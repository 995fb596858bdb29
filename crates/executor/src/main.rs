#[tokio::main]
async fn main() {
    executor::start(std::env::args()).await;
}
