pub mod play;

use comfy_table::{presets::UTF8_FULL, Table};
use zkhunt_game::board::{map_pool_digest, MAP_POOL_VERSION};
use zkhunt_game::{commit, generate_nonce, Board, Game, Position, GRID_SIZE, MAP_COUNT};

pub fn show_maps(index: Option<u8>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(index) = index {
        let board = Board::get(index)
            .ok_or_else(|| format!("Map index must be below {}", MAP_COUNT))?;
        println!("Map {}", index);
        println!("{}", render_board(&board, |_| None));
        return Ok(());
    }

    println!(
        "Map pool v{} ({})",
        MAP_POOL_VERSION,
        hex::encode(map_pool_digest())
    );

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Map", "Jungle tiles", "Plains tiles"]);

    for i in 0..MAP_COUNT as u8 {
        let board = Board::from_index(i);
        let plains = board.plains().count();
        table.add_row(vec![
            i.to_string(),
            (GRID_SIZE as usize * GRID_SIZE as usize - plains).to_string(),
            plains.to_string(),
        ]);
    }

    println!("{}", table);
    Ok(())
}

pub fn show_commitment(x: u8, y: u8, nonce: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    if !Position::new(x, y).in_bounds() {
        return Err(format!("Coordinates must be below {}", GRID_SIZE).into());
    }
    let nonce = match nonce {
        Some(raw) => raw
            .parse::<u128>()
            .map_err(|e| format!("Invalid nonce: {}", e))?,
        None => generate_nonce(),
    };

    println!("Position:   ({}, {})", x, y);
    println!("Nonce:      {}", nonce);
    println!("Commitment: {}", commit(x, y, nonce));
    Ok(())
}

/// Terrain grid with optional per-tile markers; `#` jungle, `.` plains.
pub fn render_board(board: &Board, marker: impl Fn(Position) -> Option<&'static str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);

    let mut header = vec![String::new()];
    header.extend((0..GRID_SIZE).map(|x| x.to_string()));
    table.set_header(header);

    for y in 0..GRID_SIZE {
        let mut row = vec![y.to_string()];
        for x in 0..GRID_SIZE {
            let pos = Position::new(x, y);
            let cell = marker(pos).unwrap_or(if board.is_jungle(pos) { "#" } else { "." });
            row.push(cell.to_string());
        }
        table.add_row(row);
    }

    table
}

/// Public view of a session: `H` hunter, `P` visible prey, `?` where the
/// hidden prey was last seen, `x` searched tiles.
pub fn render_game(game: &Game) -> Table {
    let searched = game.searched_tiles();
    render_board(&game.board(), |pos| {
        if pos == game.hunter_position() {
            Some("H")
        } else if game.visible_prey_position() == Some(pos) {
            Some("P")
        } else if game.prey_is_hidden && pos == game.last_known_prey_position() {
            Some("?")
        } else if searched.contains(&pos) {
            Some("x")
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_marks_override_terrain() {
        let board = Board::from_index(0);
        let rendered = render_board(&board, |pos| (pos == Position::new(0, 0)).then_some("H")).to_string();

        assert!(rendered.contains('H'));
        assert!(rendered.contains('#'));
        assert!(rendered.contains('.'));
    }

    #[test]
    fn test_show_commitment_rejects_bad_input() {
        assert!(show_commitment(8, 0, None).is_err());
        assert!(show_commitment(1, 1, Some("not-a-number")).is_err());
        assert!(show_commitment(1, 1, Some("42")).is_ok());
    }

    #[test]
    fn test_show_maps_bounds() {
        assert!(show_maps(Some(19)).is_ok());
        assert!(show_maps(Some(20)).is_err());
        assert!(show_maps(None).is_ok());
    }
}
