use anyhow::Result;

fn main() -> Result<()> {
    env_logger::init();
    extrasheet_diff::cli::run()
}
