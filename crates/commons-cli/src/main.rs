fn main() -> anyhow::Result<()> {
    commons_cli::run()
}
