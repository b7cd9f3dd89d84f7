fn main() -> anyhow::Result<()> {
    devlinks::cli::run()
}
