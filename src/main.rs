fn main() -> anyhow::Result<()> {
    eventual::run()
}
