use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    minecraft_mcp::cli::main()
}
