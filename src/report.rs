use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};

use crate::ranker::RankedSelection;

// Rows fade from full brightness down to 40% as volatility drops off the leader.
fn get_visibility_ratio(current: f64, top: f64) -> f64 {
    let ratio = 0.4 + 0.6 * (current / top);
    if ratio.is_nan() { 0.4 } else { ratio.clamp(0.4, 1.0) }
}

// "+1.23%" or "n/a" when the reference candle was missing
fn format_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:+.2}%", v),
        None => "n/a".to_string(),
    }
}

fn format_volume(value: Option<f64>) -> String {
    match value {
        Some(v) if v >= 1_000_000.0 => format!("{:.1}M", v / 1_000_000.0),
        Some(v) if v >= 1_000.0 => format!("{:.1}K", v / 1_000.0),
        Some(v) => format!("{:.0}", v),
        None => "n/a".to_string(),
    }
}

// Gains in green, losses in red, both dimmed with the row.
fn change_cell(value: Option<f64>, brightness: u8) -> Cell {
    let color = match value {
        Some(v) if v >= 0.0 => Color::Rgb {
            r: 0,
            g: brightness,
            b: 0,
        },
        Some(_) => Color::Rgb {
            r: brightness,
            g: 0,
            b: 0,
        },
        None => Color::DarkGrey,
    };
    Cell::new(format_pct(value))
        .fg(color)
        .set_alignment(CellAlignment::Right)
}

/// **Selection Table**
/// One row per ranked symbol, brightest at the top. The caller prints it.
pub fn render_selection(selection: &RankedSelection) -> Table {
    // 1. Table frame and header
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            ["Rank", "Symbol", "Close", "Day", "Week", "Month", "ATR", "Volatility", "Avg Volume"]
                .into_iter()
                .enumerate()
                .map(|(i, title)| {
                    let cell = Cell::new(title).add_attribute(Attribute::Bold);
                    if i >= 2 { cell.set_alignment(CellAlignment::Right) } else { cell }
                }),
        );

    // 2. The leader sets the brightness scale; guard a zero divisor
    let top = selection.first().map(|m| m.volatility).unwrap_or(1.0);
    let safe_top = if top == 0.0 { 1.0 } else { top };

    // 3. Rows, already sorted by the ranker
    for (rank, metrics) in selection.iter().enumerate() {
        let ratio = get_visibility_ratio(metrics.volatility, safe_top);
        let cyan_val = (255.0 * ratio) as u8;
        let green_val = (255.0 * ratio) as u8;

        table.add_row(vec![
            Cell::new(rank + 1).fg(Color::DarkGrey),
            Cell::new(&metrics.symbol).fg(Color::Rgb {
                r: 0,
                g: cyan_val,
                b: cyan_val,
            }),
            Cell::new(format!("{:.2}", metrics.latest_close)).set_alignment(CellAlignment::Right),
            change_cell(metrics.day_change_pct, green_val),
            change_cell(metrics.week_change_pct, green_val),
            change_cell(metrics.month_change_pct, green_val),
            Cell::new(format!("{:.2}", metrics.atr)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}%", metrics.volatility * 100.0))
                .set_alignment(CellAlignment::Right),
            Cell::new(format_volume(metrics.avg_volume)).set_alignment(CellAlignment::Right),
        ]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Policy;
    use crate::metrics::SymbolMetrics;
    use crate::ranker::select;

    #[test]
    fn visibility_ratio_is_bounded() {
        assert_eq!(get_visibility_ratio(1.0, 1.0), 1.0);
        assert_eq!(get_visibility_ratio(0.0, 1.0), 0.4);
        assert_eq!(get_visibility_ratio(-3.0, 1.0), 0.4);
        assert_eq!(get_visibility_ratio(f64::NAN, 1.0), 0.4);
    }

    #[test]
    fn formats_missing_values_as_na() {
        assert_eq!(format_pct(None), "n/a");
        assert_eq!(format_pct(Some(1.234)), "+1.23%");
        assert_eq!(format_pct(Some(-0.5)), "-0.50%");
        assert_eq!(format_volume(Some(2_500_000.0)), "2.5M");
        assert_eq!(format_volume(Some(12_300.0)), "12.3K");
        assert_eq!(format_volume(None), "n/a");
    }

    #[test]
    fn table_lists_every_selected_symbol() {
        let selection = select(
            vec![
                SymbolMetrics {
                    symbol: "TSLA".to_string(),
                    as_of: "2024-01-02T00:00:00.000Z".to_string(),
                    latest_close: 248.42,
                    day_change_pct: Some(-1.2),
                    week_change_pct: None,
                    month_change_pct: Some(4.0),
                    atr: 7.5,
                    volatility: 0.031,
                    avg_volume: Some(95_000_000.0),
                },
                SymbolMetrics {
                    symbol: "SPY".to_string(),
                    as_of: "2024-01-02T00:00:00.000Z".to_string(),
                    latest_close: 472.65,
                    day_change_pct: Some(0.3),
                    week_change_pct: Some(1.1),
                    month_change_pct: None,
                    atr: 3.1,
                    volatility: 0.008,
                    avg_volume: None,
                },
            ],
            &Policy::default(),
        );

        let rendered = render_selection(&selection).to_string();
        assert!(rendered.contains("TSLA"));
        assert!(rendered.contains("SPY"));
        assert!(rendered.contains("248.42"));
        assert!(rendered.contains("n/a"));
    }
}
