use duck_printer::{
    preview_row, Config, Lcdc, LoopbackLink, Plane, Printer, RowBuffer, Screen, UsbLink, Vram,
    SCREEN_HEIGHT_TILES,
};
use std::{env, fs, time::Duration};

//
// cargo run --example print_vram vram.bin 0 0 0 0x91
// cargo run --example print_vram vram.bin 0 0 0 0x91 0x1209 0x0001
//

fn parse_u16(arg: &str) -> Option<u16> {
    match arg.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => arg.parse().ok(),
    }
}

fn parse_u8(arg: &str) -> Option<u8> {
    parse_u16(arg).and_then(|v| if v <= 0xFF { Some(v as u8) } else { None })
}

fn print_usage() {
    println!("Usage: cargo run --example print_vram <vram-dump> <scx> <scy> <wy> <lcdc> [vid pid]");
    println!("  vram-dump  8192 bytes of 0x8000..0xA000");
    println!("  vid pid    USB serial bridge ids; without them the job is a dry run");
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 6 {
        print_usage();
        return;
    }

    let registers: Vec<u8> = match args[2..6].iter().map(|a| parse_u8(a)).collect::<Option<Vec<u8>>>() {
        Some(registers) => registers,
        None => {
            eprintln!("Error: registers must be 0..255, decimal or 0x hex");
            print_usage();
            return;
        }
    };

    let bytes = match fs::read(&args[1]) {
        Ok(bytes) => bytes,
        Err(err) => panic!("could not read {}: {}", args[1], err),
    };
    let mut vram = match Vram::from_bytes(&bytes) {
        Ok(vram) => vram,
        Err(err) => panic!("{}", err),
    };
    vram.set_scroll(registers[0], registers[1]);
    vram.set_lcdc(Lcdc::from_bits_truncate(registers[3]));
    vram.set_window(registers[2], vram.lcdc().contains(Lcdc::WIN_ON));

    match (args.get(6).and_then(|a| parse_u16(a)), args.get(7).and_then(|a| parse_u16(a))) {
        (Some(vid), Some(pid)) => {
            let link = UsbLink::open(vid, pid, None).expect("could not open USB bridge");
            let mut printer = Printer::new(link, Config::new()).expect("invalid config");
            match printer.print_screen(&mut vram) {
                Ok(()) => println!("print finished"),
                Err(err) => println!("print failed: {}", err),
            }
        }
        _ => {
            let config = Config::new().row_delay(Duration::from_millis(0));
            let mut printer =
                Printer::new(LoopbackLink::new(1), config).expect("invalid config");
            match printer.print_screen(&mut vram) {
                Ok(()) => {
                    let link = printer.link();
                    println!(
                        "dry run: {} packets, {} bulk bytes",
                        link.packets().count(),
                        link.raw_bytes().count()
                    );
                }
                Err(err) => println!("dry run failed: {}", err),
            }

            let mut row = RowBuffer::new();
            for r in 0..SCREEN_HEIGHT_TILES {
                row.assemble(&vram, r, Plane::Both);
                for line in preview_row(&row) {
                    println!("{}", line);
                }
            }
        }
    }
}
