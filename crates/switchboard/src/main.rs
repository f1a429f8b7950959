#[tokio::main]
async fn main() {
    if let Err(e) = lib_switchboard::init().await {
        eprintln!("❌ Switchboard failed: {e}");
        std::process::exit(1);
    }
}
