use placement_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("placement-api error: {err}");
        std::process::exit(1);
    }
}
