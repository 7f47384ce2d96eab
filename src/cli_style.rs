use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Attribute, Stylize};
use unicode_width::UnicodeWidthStr;

// ═══════════════════════════════════════════════════════════════════════════════
// Clap Styles
// ═══════════════════════════════════════════════════════════════════════════════

pub fn get_styles() -> Styles {
    let heading = Style::new()
        .bold()
        .underline()
        .fg_color(Some(Color::Ansi(AnsiColor::Blue)));
    let good = Style::new()
        .bold()
        .fg_color(Some(Color::Ansi(AnsiColor::Green)));
    let bad = Style::new()
        .bold()
        .fg_color(Some(Color::Ansi(AnsiColor::Red)));

    Styles::styled()
        .usage(heading)
        .header(heading)
        .literal(good)
        .valid(good)
        .invalid(bad)
        .error(bad)
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Palette
// ═══════════════════════════════════════════════════════════════════════════════

pub mod colors {
    use crossterm::style::Color;

    pub const ACCENT: Color = Color::Rgb {
        r: 90,
        g: 160,
        b: 255,
    };
    pub const AUTHOR: Color = Color::Rgb {
        r: 255,
        g: 190,
        b: 90,
    };
    pub const PRIVATE: Color = Color::Rgb {
        r: 255,
        g: 105,
        b: 180,
    };
    pub const GREEN: Color = Color::Rgb {
        r: 0,
        g: 220,
        b: 130,
    };
    pub const RED: Color = Color::Rgb {
        r: 255,
        g: 85,
        b: 85,
    };
    pub const DIM: Color = Color::Rgb {
        r: 128,
        g: 128,
        b: 128,
    };
    pub const WHITE: Color = Color::Rgb {
        r: 240,
        g: 240,
        b: 240,
    };
}

mod box_chars {
    pub const TOP_LEFT: &str = "╭";
    pub const TOP_RIGHT: &str = "╮";
    pub const BOTTOM_LEFT: &str = "╰";
    pub const BOTTOM_RIGHT: &str = "╯";
    pub const HORIZONTAL: &str = "─";
    pub const VERTICAL: &str = "│";
    pub const T_LEFT: &str = "├";
    pub const T_RIGHT: &str = "┤";
    pub const T_TOP: &str = "┬";
    pub const T_BOTTOM: &str = "┴";
    pub const CROSS: &str = "┼";
    pub const BULLET: &str = "●";
    pub const BULLET_EMPTY: &str = "○";
    pub const CROSS_MARK: &str = "✗";
}

// ═══════════════════════════════════════════════════════════════════════════════
// Messages
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_error(message: &str) {
    eprintln!(
        " {} {}",
        box_chars::CROSS_MARK.with(colors::RED).bold(),
        message.with(colors::RED)
    );
}

pub fn print_empty_list(message: &str) {
    println!(
        "  {} {}",
        box_chars::BULLET_EMPTY.with(colors::DIM),
        message.with(colors::DIM).attribute(Attribute::Italic)
    );
}

pub fn print_key_value(key: &str, value: &str) {
    println!(
        "  {} {} {}",
        box_chars::BULLET.with(colors::ACCENT),
        format!("{}:", key).with(colors::DIM),
        value.with(colors::WHITE)
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Journals
// ═══════════════════════════════════════════════════════════════════════════════

/// `#3  Jane Doe  2024-03-14 09:12 (private)` followed by the note and the
/// rendered detail lines.
pub fn print_journal_entry(
    indice: Option<usize>,
    author: &str,
    created_on: &str,
    private_notes: bool,
    notes: Option<&str>,
    lines: &[String],
) {
    let number = indice.map(|i| format!("#{}", i)).unwrap_or_default();
    print!(
        "{} {}  {}",
        number.with(colors::ACCENT).bold(),
        author.with(colors::AUTHOR).bold(),
        created_on.with(colors::DIM)
    );
    if private_notes {
        print!(" {}", "(private)".with(colors::PRIVATE));
    }
    println!();
    for line in lines {
        println!("  {} {}", box_chars::BULLET.with(colors::GREEN), line);
    }
    if let Some(notes) = notes {
        for note_line in notes.lines() {
            println!("  {} {}", box_chars::VERTICAL.with(colors::DIM), note_line);
        }
    }
    println!();
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tables
// ═══════════════════════════════════════════════════════════════════════════════

pub struct TableBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    widths: Vec<usize>,
}

impl TableBuilder {
    pub fn new(headers: Vec<String>) -> Self {
        let widths = headers.iter().map(|h| h.width()).collect();
        TableBuilder {
            headers,
            rows: Vec::new(),
            widths,
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        for (width, cell) in self.widths.iter_mut().zip(&row) {
            *width = (*width).max(cell.width());
        }
        self.rows.push(row);
    }

    fn print_rule(&self, left: &str, junction: &str, right: &str) {
        let segments: Vec<String> = self
            .widths
            .iter()
            .map(|w| box_chars::HORIZONTAL.repeat(w + 2))
            .collect();
        println!(
            "{}",
            format!("{}{}{}", left, segments.join(junction), right).with(colors::ACCENT)
        );
    }

    fn print_cells(&self, cells: &[String], header: bool) {
        print!("{}", box_chars::VERTICAL.with(colors::ACCENT));
        for (i, width) in self.widths.iter().enumerate() {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            let padding = " ".repeat(width.saturating_sub(cell.width()));
            if header {
                print!(" {}{} ", cell.with(colors::ACCENT).bold(), padding);
            } else {
                print!(" {}{} ", cell.with(colors::WHITE), padding);
            }
            print!("{}", box_chars::VERTICAL.with(colors::ACCENT));
        }
        println!();
    }

    pub fn print(&self) {
        self.print_rule(box_chars::TOP_LEFT, box_chars::T_TOP, box_chars::TOP_RIGHT);
        self.print_cells(&self.headers, true);
        self.print_rule(box_chars::T_LEFT, box_chars::CROSS, box_chars::T_RIGHT);
        for row in &self.rows {
            self.print_cells(row, false);
        }
        self.print_rule(
            box_chars::BOTTOM_LEFT,
            box_chars::T_BOTTOM,
            box_chars::BOTTOM_RIGHT,
        );
    }
}
