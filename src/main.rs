fn main() -> anyhow::Result<()> {
    macro_shortcuts_lib::run()
}
