//! List commands implementation

use crate::programmers;

/// List all supported programmers
pub fn list_programmers() {
    println!("Supported programmers:");
    println!();
    for p in programmers::available_programmers() {
        println!("  {:<10} - {}", p.name, p.description);
        if !p.aliases.is_empty() {
            println!("  {:<10}   aliases: {}", "", p.aliases.join(", "));
        }
    }
    println!();
    println!("Programmer options are given as name:key=value,...");
}
