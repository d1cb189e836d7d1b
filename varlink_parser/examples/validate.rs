use std::env;
use std::error::Error;
use std::fs;
use std::io::{self, Read};

use varlink_parser::Interface;

fn main() -> Result<(), Box<dyn Error>> {
    let mut buffer = String::new();

    match env::args().nth(1) {
        None => {
            io::stdin().read_to_string(&mut buffer)?;
        }
        Some(path) => buffer = fs::read_to_string(path)?,
    }

    let iface = Interface::from_string(&buffer)?;
    print!("{}", iface);
    Ok(())
}
