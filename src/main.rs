//! SILT - Interactive Shell
//! A small REPL over the storage engine core, mostly useful for
//! poking at the write and read paths by hand.

use std::io::{self, BufRead, Write};

use silt::config::Config;
use silt::engine::Silt;

fn main() {
    env_logger::init();

    println!();
    println!("  silt - write-path core of an object-store-backed KV engine");
    println!();
    println!("  Commands:");
    println!("    set <key> <value>  - Store a key-value pair");
    println!("    get <key>          - Retrieve a value by key");
    println!("    del <key>          - Delete a key");
    println!("    info               - Show engine statistics");
    println!("    exit               - Shutdown engine");
    println!();

    let config = Config::default();
    let engine = match Silt::open(config) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("[ERROR] Failed to open engine: {err}");
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("silt> ");
        stdout.flush().unwrap();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap() == 0 {
            break; // EOF
        }

        let parts: Vec<&str> = line.trim().split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        match parts[0].to_lowercase().as_str() {
            "set" | "put" => {
                if parts.len() < 3 {
                    println!("  Usage: set <key> <value>");
                    continue;
                }
                let key = parts[1].as_bytes().to_vec();
                let value = parts[2..].join(" ").into_bytes();
                match engine.put(key, value).map(|signal| signal.wait_applied()) {
                    Ok(Ok(_)) => println!("  OK"),
                    Ok(Err(e)) | Err(e) => println!("  ERROR: {e}"),
                }
            }
            "get" => {
                if parts.len() < 2 {
                    println!("  Usage: get <key>");
                    continue;
                }
                match engine.get(parts[1].as_bytes()) {
                    Some(value) => match std::str::from_utf8(&value) {
                        Ok(text) => println!("  \"{text}\""),
                        Err(_) => println!("  <binary data>"),
                    },
                    None => println!("  (nil)"),
                }
            }
            "del" | "delete" => {
                if parts.len() < 2 {
                    println!("  Usage: del <key>");
                    continue;
                }
                let key = parts[1].as_bytes().to_vec();
                match engine.delete(key).map(|signal| signal.wait_applied()) {
                    Ok(Ok(_)) => println!("  OK (deleted)"),
                    Ok(Err(e)) | Err(e) => println!("  ERROR: {e}"),
                }
            }
            "info" | "stats" => {
                println!("{}", engine.metrics().report());
                println!("  Active segment:    {}", engine.active_segment_id());
                println!("  Inactive segments: {}", engine.inactive_segment_count());
            }
            "exit" | "quit" | "q" => {
                println!("  Shutting down silt...");
                engine.close();
                break;
            }
            other => {
                println!("  Unknown command: '{other}'. Type 'exit' to quit.");
            }
        }
    }
}
