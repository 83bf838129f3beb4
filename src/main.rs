#[tokio::main]
async fn main() {
    if let Err(error) = todo_ticker_lib::run().await {
        tracing::error!(%error, "todo-ticker failed");
        eprintln!("todo-ticker: {error}");
        std::process::exit(1);
    }
}
