use std::process;

use duck_printer::{Config, Error, Printer, PrinterStatus, UsbLink};

//
// cargo run 4617 1 [serial]
//

fn parse_id(arg: &str) -> Option<u16> {
    match arg.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => arg.parse().ok(),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        println!("usage: duck-printer <bridge-vendor-id> <bridge-product-id> [serial]");
        return;
    }

    let (vid, pid) = match (parse_id(&args[1]), parse_id(&args[2])) {
        (Some(vid), Some(pid)) => (vid, pid),
        _ => {
            eprintln!("ids must be decimal or 0x prefixed hex");
            process::exit(2);
        }
    };
    let serial = args.get(3).map(String::as_str);

    let link = match UsbLink::open(vid, pid, serial) {
        Ok(link) => link,
        Err(err) => {
            eprintln!("could not open bridge {:04x}:{:04x}: {}", vid, pid, err);
            process::exit(1);
        }
    };

    let mut printer = match Printer::new(link, Config::new()) {
        Ok(printer) => printer,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    };

    match printer.check_status() {
        Ok(printer_type) => println!("printer detected: {:?}", printer_type),
        Err(Error::NoPrinter(PrinterStatus::Fail)) => println!("no printer detected"),
        Err(err) => {
            println!("{}", err);
            process::exit(1);
        }
    }
}
