use crate::{row::RowBuffer, tile::TILE_SIZE};

/// Render what the print head would put on paper for a row buffer.
///
/// Returns 8 lines of 160 characters, `#` for a burnt dot, `.` for blank.
pub fn preview_row(row: &RowBuffer) -> Vec<String> {
    (0..TILE_SIZE)
        .map(|y| {
            row.as_bytes()
                .iter()
                .map(|&column| if column & (0x80u8 >> y) != 0 { '#' } else { '.' })
                .collect::<String>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{screen::Vram, tile::Plane};

    #[test]
    fn preview_matches_screen_pixels() {
        // Left half of the first tile in shade 3, right half blank
        let mut vram = Vram::new();
        vram.set_bkg_data(1, &[0xF0; 16]);
        vram.set_bkg_tile_xy(0, 0, 1);

        let mut row = RowBuffer::new();
        row.assemble(&vram, 0, Plane::Both);
        let lines = preview_row(&row);

        assert_eq!(lines.len(), 8);
        for line in &lines {
            assert_eq!(line.len(), 160);
            assert!(line.starts_with("####...."));
            assert!(line[8..].chars().all(|c| c == '.'));
        }
    }
}
