use duck_printer::{
    convert_tile, Config, Error, Interrupts, Lcdc, LoopbackLink, Phase, Plane, Printer, Screen,
    Tile, Vram, WireEvent, CARRIAGE_RETURN, LINE_FEED, SCREEN_HEIGHT_TILES,
};
use std::time::Duration;

const ROW_DELAY: Duration = Duration::from_millis(1000);
const BLACK: Tile = [0xFF; 16];
const CHECKER: Tile = [
    0xAA, 0x55, 0x55, 0xAA, 0xAA, 0x55, 0x55, 0xAA, 0xAA, 0x55, 0x55, 0xAA, 0xAA, 0x55, 0x55, 0xAA,
];

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn printer(link: LoopbackLink) -> Printer<LoopbackLink> {
    Printer::new(link, Config::new()).unwrap()
}

fn filled_vram(tile: &Tile) -> Vram {
    let mut vram = Vram::new();
    vram.set_bkg_data(1, tile);
    vram.fill_bkg_rect(0, 0, 32, 32, 1);
    vram
}

/// Split a single pass job into rows, each ending with the pause after it.
fn one_pass_rows(events: &[WireEvent]) -> Vec<&[WireEvent]> {
    events
        .split_inclusive(|e| *e == WireEvent::Delay(ROW_DELAY))
        .filter(|row| row.last() == Some(&WireEvent::Delay(ROW_DELAY)))
        .collect()
}

/// Every byte a single pass row put on the wire, packets then bulk.
fn row_bytes(row: &[WireEvent]) -> Vec<u8> {
    let mut bytes: Vec<u8> = row
        .iter()
        .filter_map(|e| match e {
            WireEvent::Packet {
                payload,
                accepted: true,
                ..
            } => Some(payload.clone()),
            _ => None,
        })
        .flatten()
        .collect();
    bytes.extend(row.iter().filter_map(|e| match e {
        WireEvent::Byte(b) => Some(*b),
        _ => None,
    }));
    bytes
}

fn terminator_reads(row: &[WireEvent]) -> usize {
    row.iter()
        .filter(|e| {
            matches!(e, WireEvent::Read { timeout, .. } if *timeout == Duration::from_millis(200))
        })
        .count()
}

/// Screen that remembers every write to the interrupt enable register.
struct Watched {
    vram: Vram,
    ie_writes: Vec<Interrupts>,
}

impl Screen for Watched {
    fn bkg_tile_xy(&self, col: u8, row: u8) -> u8 {
        self.vram.bkg_tile_xy(col, row)
    }
    fn win_tile_xy(&self, col: u8, row: u8) -> u8 {
        self.vram.win_tile_xy(col, row)
    }
    fn bkg_data(&self, id: u8) -> Tile {
        self.vram.bkg_data(id)
    }
    fn scx(&self) -> u8 {
        self.vram.scx()
    }
    fn scy(&self) -> u8 {
        self.vram.scy()
    }
    fn wy(&self) -> u8 {
        self.vram.wy()
    }
    fn lcdc(&self) -> Lcdc {
        self.vram.lcdc()
    }
    fn interrupt_enable(&self) -> Interrupts {
        self.vram.interrupt_enable()
    }
    fn set_interrupt_enable(&mut self, ie: Interrupts) {
        self.ie_writes.push(ie);
        self.vram.set_interrupt_enable(ie);
    }
}

#[test]
fn single_pass_all_black() {
    init();
    let mut vram = filled_vram(&BLACK);
    let mut printer = printer(LoopbackLink::new(1));
    printer.print_screen(&mut vram).unwrap();

    let rows = one_pass_rows(printer.link().events());
    assert_eq!(rows.len(), 1 + 18 + 4);

    for (n, row) in rows.iter().enumerate() {
        let bytes = row_bytes(row);
        assert_eq!(bytes.len(), 4 * 12 + 112 + 6, "row {}", n);
        assert_eq!(terminator_reads(row), 2, "row {}", n);
        assert!(bytes[160..].iter().all(|&b| b == 0));

        let body = n >= 1 && n <= 18;
        let expected = if body { 0xFF } else { 0x00 };
        assert!(bytes[..160].iter().all(|&b| b == expected), "row {}", n);
    }

    let body_bytes: usize = rows[1..19].iter().map(|row| row_bytes(row).len()).sum();
    assert_eq!(body_bytes, 2988);
}

#[test]
fn double_pass_checkerboard() {
    init();
    let mut vram = filled_vram(&CHECKER);
    let mut printer = printer(LoopbackLink::new(2));
    printer.print_screen(&mut vram).unwrap();

    let link = printer.link();
    assert_eq!(link.raw_bytes().count(), 0);
    let packets: Vec<&[u8]> = link.packets().collect();
    assert_eq!(packets.len(), (1 + 18 + 4) * 28);

    let plane0_tile = convert_tile(&CHECKER, Plane::Plane0);
    let plane1_tile = convert_tile(&CHECKER, Plane::Plane1);
    for (a, b) in plane0_tile.iter().zip(plane1_tile.iter()) {
        assert_eq!(a ^ b, 0xFF);
    }

    for r in 0..SCREEN_HEIGHT_TILES as usize {
        let row = &packets[(1 + r) * 28..(2 + r) * 28];
        for (pass, tile) in [(&row[..14], plane0_tile), (&row[14..], plane1_tile)].iter() {
            let mut data: Vec<u8> = pass[..13].iter().flat_map(|p| p.iter().copied()).collect();
            data.extend_from_slice(&pass[13][..4]);
            assert_eq!(data.len(), 160);
            for chunk in data.chunks(8) {
                assert_eq!(chunk, &tile[..]);
            }
        }

        let first_last = row[13];
        assert_eq!(first_last.len(), 5);
        assert_eq!(first_last[4], CARRIAGE_RETURN);
        let second_last = row[27];
        assert_eq!(second_last.len(), 6);
        assert_eq!(second_last[4], CARRIAGE_RETURN);
        assert_eq!(second_last[5], LINE_FEED);
    }

    // First body row, one plane at a time
    let plane0_bytes: usize = packets[28..42].iter().map(|p| p.len()).sum();
    assert_eq!(plane0_bytes, 13 * 12 + 5);
    let plane1_bytes: usize = packets[42..56].iter().map(|p| p.len()).sum();
    assert_eq!(plane1_bytes, 13 * 12 + 6);
}

#[test]
fn retry_exhaustion_fails_and_restores_interrupts() {
    init();
    let mut vram = filled_vram(&BLACK);
    let ie = Interrupts::VBLANK | Interrupts::SERIAL | Interrupts::JOYPAD;
    vram.set_interrupt_enable(ie);

    let mut printer = printer(LoopbackLink::new(1).reject_packets());
    let result = printer.print_screen(&mut vram);

    assert!(matches!(
        result,
        Err(Error::PacketSendTimeout {
            phase: Phase::Preamble
        })
    ));
    assert!(printer.link().packet_attempts() <= 11);
    assert_eq!(vram.interrupt_enable(), ie);
}

#[test]
fn vblank_masked_for_whole_job() {
    init();
    let ie = Interrupts::VBLANK | Interrupts::SERIAL;
    let mut screen = Watched {
        vram: filled_vram(&BLACK),
        ie_writes: Vec::new(),
    };
    screen.vram.set_interrupt_enable(ie);

    let mut printer = printer(LoopbackLink::new(1));
    printer.print_screen(&mut screen).unwrap();
    assert_eq!(screen.ie_writes, vec![Interrupts::SERIAL, ie]);
}

#[test]
fn failure_mid_body_skips_trailer() {
    init();
    let ie = Interrupts::VBLANK | Interrupts::TIMER;
    let mut screen = Watched {
        vram: filled_vram(&BLACK),
        ie_writes: Vec::new(),
    };
    screen.vram.set_interrupt_enable(ie);

    // Preamble and rows 0 to 2 go through, row 3 dies on its first packet
    let mut printer = printer(LoopbackLink::new(1).accept_packets(4 * 4));
    let result = printer.print_screen(&mut screen);

    assert!(matches!(
        result,
        Err(Error::PacketSendTimeout {
            phase: Phase::Body(3)
        })
    ));
    assert_eq!(screen.ie_writes, vec![Interrupts::TIMER, ie]);

    let link = printer.link();
    assert_eq!(link.packet_attempts(), 16 + 10);
    assert_eq!(link.raw_bytes().count(), 4 * 118);
    assert_eq!(link.events().last(), Some(&WireEvent::Delay(ROW_DELAY)));
}

#[test]
fn no_printer_leaves_screen_alone() {
    init();
    let mut screen = Watched {
        vram: filled_vram(&BLACK),
        ie_writes: Vec::new(),
    };
    let mut printer = printer(LoopbackLink::new(0));
    let result = printer.print_screen(&mut screen);

    assert!(matches!(result, Err(Error::NoPrinter(_))));
    assert!(screen.ie_writes.is_empty());
    assert_eq!(printer.link().events(), &[WireEvent::Query(0)]);
}

#[test]
fn maybe_busy_prints_as_single_pass() {
    init();
    let mut vram = filled_vram(&CHECKER);

    let mut busy = printer(LoopbackLink::new(3));
    busy.print_screen(&mut vram).unwrap();
    let mut single = printer(LoopbackLink::new(1));
    single.print_screen(&mut vram).unwrap();

    assert_eq!(busy.link().events()[0], WireEvent::Query(3));
    assert_eq!(single.link().events()[0], WireEvent::Query(1));
    assert_eq!(busy.link().events()[1..], single.link().events()[1..]);
}

#[test]
fn scrolled_screen_prints_from_map_offset() {
    init();
    let mut vram = Vram::new();
    // Shade 3 where the id has a bit: the first printer column reads back the id
    for id in 0..=255u8 {
        let mut tile = [0u8; 16];
        for row in 0..8 {
            if id & (0x80 >> row) != 0 {
                tile[2 * row] = 0x80;
                tile[2 * row + 1] = 0x80;
            }
        }
        vram.set_bkg_data(id, &tile);
    }
    for row in 0..32u8 {
        for col in 0..32u8 {
            vram.set_bkg_tile_xy(col, row, (row as u16 * 32 + col as u16) as u8);
        }
    }
    vram.set_scroll(24, 16);
    vram.set_window(0, false);

    let mut printer = printer(LoopbackLink::new(1));
    printer.print_screen(&mut vram).unwrap();

    let rows = one_pass_rows(printer.link().events());
    let first = row_bytes(rows[1]);
    for t in 0..20u8 {
        assert_eq!(first[8 * t as usize], 2 * 32 + 3 + t);
    }
}

#[test]
fn window_overrides_background_below_wy() {
    init();
    let right_half: Tile = [0x0F; 16];
    let light: Tile = [
        0xFF, 0, 0xFF, 0, 0xFF, 0, 0xFF, 0, 0xFF, 0, 0xFF, 0, 0xFF, 0, 0xFF, 0,
    ];

    let mut vram = filled_vram(&BLACK);
    vram.set_bkg_data(2, &right_half);
    vram.set_bkg_data(3, &light);
    vram.set_lcdc(vram.lcdc() | Lcdc::WIN_9C00);
    for row in 0..32u8 {
        for col in 0..32u8 {
            vram.set_win_tile_xy(col, row, if row == 0 { 2 } else { 3 });
        }
    }
    vram.set_window(24, true);

    let mut printer = printer(LoopbackLink::new(1));
    printer.print_screen(&mut vram).unwrap();
    let rows = one_pass_rows(printer.link().events());

    let window_top = convert_tile(&right_half, Plane::Both);
    let window_rest = convert_tile(&light, Plane::Both);
    for r in 0..18usize {
        let bytes = row_bytes(rows[1 + r]);
        for chunk in bytes[..160].chunks(8) {
            match r {
                0..=2 => assert_eq!(chunk, &[0xFF; 8][..], "row {}", r),
                3 => assert_eq!(chunk, &window_top[..], "row {}", r),
                _ => assert_eq!(chunk, &window_rest[..], "row {}", r),
            }
        }
    }
}

#[test]
fn trailer_length_follows_config() {
    init();
    let mut vram = filled_vram(&BLACK);
    let config = Config::new().trailing_blank_rows(1);
    let mut printer = Printer::new(LoopbackLink::new(1), config).unwrap();
    printer.print_screen(&mut vram).unwrap();

    let rows = one_pass_rows(printer.link().events());
    assert_eq!(rows.len(), 1 + 18 + 1);
    assert!(printer.row_buffer().as_bytes().iter().all(|&b| b == 0));
}
