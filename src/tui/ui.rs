//! UI rendering for the front panel.

use ratatui::{
    prelude::*,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

use super::app::PanelApp;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &PanelApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(frame.area());

    // Left side: program and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(3)])
        .split(chunks[0]);

    draw_listing(frame, left_chunks[0], app);
    draw_status(frame, left_chunks[1], app);

    // Right side: lamps and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Length(10),
            Constraint::Min(4),
        ])
        .split(chunks[1]);

    draw_registers(frame, right_chunks[0], app);
    draw_flags(frame, right_chunks[1], app);
    draw_help(frame, right_chunks[2]);
}

/// Draw the program listing.
fn draw_listing(frame: &mut Frame, area: Rect, app: &PanelApp) {
    let listing = app.get_listing((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = listing
        .iter()
        .map(|(addr, instr, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if *addr < app.pc {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };

            ListItem::new(format!("{}{:03}: {}", prefix, addr, instr)).style(style)
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(" Program ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(list, area);
}

/// One lamp per bit, most significant first.
fn lamp_row(value: u8, bits: std::ops::RangeInclusive<u8>, color: Color) -> Vec<Span<'static>> {
    bits.rev()
        .map(|n| {
            if value & (1 << n) != 0 {
                Span::styled("● ", Style::default().fg(color).add_modifier(Modifier::BOLD))
            } else {
                Span::styled("○ ", Style::default().fg(Color::DarkGray))
            }
        })
        .collect()
}

fn lamp(on: bool, color: Color) -> Span<'static> {
    lamp_row(u8::from(on), 0..=0, color).remove(0)
}

/// Draw the register lamps.
fn draw_registers(frame: &mut Frame, area: Rect, app: &PanelApp) {
    let regs = &app.cpu.regs;

    let mut output = vec![Span::raw("OUTPUT  ")];
    output.extend(lamp_row(regs.output, 0..=7, Color::Red));
    output.push(Span::raw(format!(" = {:3}", regs.output)));

    let mut scratch = vec![Span::raw("SCRATCH ")];
    scratch.extend(lamp_row(regs.scratch, 0..=7, Color::Yellow));
    scratch.push(Span::raw(format!(" = {:3}", regs.scratch)));

    let mut input = vec![Span::raw("INPUT   ")];
    input.extend(lamp_row(regs.input, 1..=7, Color::Green));
    input.push(Span::styled("  ", Style::default()));
    input.push(Span::raw(format!(" = {:3}", regs.input)));

    let content = vec![
        Line::from(output),
        Line::from(scratch),
        Line::from(input),
        Line::from(vec![
            Span::raw("RR "),
            lamp(regs.rr == 1, Color::Yellow),
            Span::raw("  CARRY "),
            lamp(regs.carry == 1, Color::Yellow),
            Span::raw("  IEN "),
            lamp(regs.ien == 1, Color::Green),
            Span::raw("  OEN "),
            lamp(regs.oen == 1, Color::Green),
        ]),
    ];

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)),
    );

    frame.render_widget(paragraph, area);
}

/// Draw the flag lamps.
fn draw_flags(frame: &mut Frame, area: Rect, app: &PanelApp) {
    let flags = &app.cpu.flags;
    let row = |name: &'static str, on: bool| Line::from(vec![Span::raw(name), lamp(on, Color::Magenta)]);

    let content = vec![
        row("FLAG 0    ", flags.zero),
        row("WRITE     ", flags.write),
        row("I/O CON   ", flags.io_control),
        row("RETURN    ", flags.rtn),
        row("SKIP Z    ", flags.skz),
        row("FLAG F    ", flags.f),
        Line::from(vec![
            Span::raw("Last: "),
            Span::styled(
                app.cpu
                    .last_instruction()
                    .map_or_else(|| "-".to_string(), |instr| instr.to_string()),
                Style::default().fg(Color::Yellow),
            ),
        ]),
        Line::from(vec![
            Span::raw("Cycles: "),
            Span::styled(format!("{}", app.cpu.cycles), Style::default().fg(Color::Cyan)),
            Span::raw("   IOC strobes: "),
            Span::styled(format!("{}", app.alerts), Style::default().fg(Color::Cyan)),
        ]),
    ];

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .title(" Flags ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)),
    );

    frame.render_widget(paragraph, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &PanelApp) {
    let style = if app.running {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::White)
    };

    let status = Paragraph::new(app.status.clone())
        .style(style)
        .block(Block::default().title(" Status ").borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  r: Run  p: Pause  x: Reset  q: Quit"),
        Line::from("1-7: Toggle input switch IR1-IR7"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default().title(" Help ").borders(Borders::ALL));

    frame.render_widget(help, area);
}
