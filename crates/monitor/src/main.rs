use std::collections::VecDeque;
use std::{io, time::Duration};

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::interval;

use driftkv_common::{DEFAULT_HOST, DEFAULT_PORT};
use driftkv_protocol::GREETING;

/// Cabeçalho + cinco contadores.
const INFO_LINES: usize = 6;

#[derive(Parser, Debug)]
#[command(name = "driftkv-monitor", about = "Monitor TUI for DriftKV")]
struct Args {
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Intervalo entre consultas INFO, em segundos
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,
}

/// Contadores de um bloco INFO.
#[derive(Debug, Default, Clone, PartialEq)]
struct Info {
    role: String,
    keys: u64,
    max_keys: u64,
    evictions: u64,
    reads: u64,
    writes: u64,
}

/// Interpreta as linhas `key:value` do INFO. Campos desconhecidos são ignorados.
fn parse_info(lines: &[String]) -> Result<Info> {
    let mut info = Info::default();
    let mut seen = false;

    for line in lines {
        if let Some(role) = line.strip_prefix("# ") {
            info.role = role.trim().to_string();
            continue;
        }
        if line.starts_with('-') {
            bail!("servidor recusou INFO: {line}");
        }
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let slot = match field {
            "keys" => &mut info.keys,
            "max_keys" => &mut info.max_keys,
            "evictions" => &mut info.evictions,
            "reads" => &mut info.reads,
            "writes" => &mut info.writes,
            _ => continue,
        };
        *slot = value
            .trim()
            .parse()
            .with_context(|| format!("valor inválido em '{line}'"))?;
        seen = true;
    }

    if !seen {
        bail!("resposta INFO sem contadores");
    }
    Ok(info)
}

struct InfoClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl InfoClient {
    async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("falha ao conectar em {addr}"))?;
        let (read, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(read),
            writer,
        };

        // Primário saúda com duas linhas, réplica com uma.
        let first = client.read_line().await?;
        if first == GREETING[0] {
            client.read_line().await?;
        }
        Ok(client)
    }

    async fn poll(&mut self) -> Result<Info> {
        self.writer.write_all(b"INFO\r\n").await?;
        self.writer.flush().await?;

        let mut lines = Vec::with_capacity(INFO_LINES);
        for _ in 0..INFO_LINES {
            let line = self.read_line().await?;
            let failed = line.starts_with('-');
            lines.push(line);
            if failed {
                break;
            }
        }
        parse_info(&lines)
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut buf = String::new();
        if self.reader.read_line(&mut buf).await? == 0 {
            bail!("servidor fechou a conexão");
        }
        Ok(buf.trim_end_matches(['\r', '\n']).to_string())
    }
}

struct App {
    data: VecDeque<(f64, f64)>,
    window_size: usize,
    x_offset: f64,
    last: Info,
}

impl App {
    fn new() -> Self {
        Self {
            data: VecDeque::with_capacity(100),
            window_size: 100,
            x_offset: 0.0,
            last: Info::default(),
        }
    }

    fn record(&mut self, info: Info) {
        self.x_offset += 1.0;
        if self.data.len() >= self.window_size {
            self.data.pop_front();
        }
        self.data.push_back((self.x_offset, info.keys as f64));
        self.last = info;
    }

    fn to_dataset(&self) -> Vec<(f64, f64)> {
        self.data.iter().cloned().collect()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    let mut client = InfoClient::connect(&addr).await?;

    // Setup Terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new();
    let mut ticker = interval(Duration::from_secs(args.interval));

    let outcome = run(&mut terminal, &mut app, &mut client, &mut ticker, &addr).await;

    // Restore Terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    outcome
}

async fn run<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    client: &mut InfoClient,
    ticker: &mut tokio::time::Interval,
    addr: &str,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app, addr))?;

        if event::poll(Duration::from_millis(0))?
            && let Event::Key(key) = event::read()?
            && key.code == KeyCode::Char('q')
        {
            return Ok(());
        }

        ticker.tick().await;
        app.record(client.poll().await?);
    }
}

fn ui(f: &mut Frame, app: &App, addr: &str) {
    let size = f.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(size);

    let last = &app.last;
    let capacity = if last.max_keys == 0 {
        "unlimited".to_string()
    } else {
        last.max_keys.to_string()
    };
    let header = Paragraph::new(vec![
        Line::from(format!("DriftKV {} - {addr} (q para sair)", last.role)),
        Line::from(format!(
            "keys: {}/{capacity}   reads: {}   writes: {}   evictions: {}",
            last.keys, last.reads, last.writes, last.evictions
        )),
    ])
    .block(Block::default().borders(Borders::ALL).title("Status"))
    .style(Style::default().fg(Color::Cyan));
    f.render_widget(header, chunks[0]);

    let data_points = app.to_dataset();
    let dataset = vec![
        Dataset::default()
            .name("Keys")
            .marker(symbols::Marker::Braille)
            .style(Style::default().fg(Color::Yellow))
            .graph_type(GraphType::Line)
            .data(&data_points),
    ];

    let x_labels = vec![
        Span::styled(
            format!("{:.0}", app.x_offset - app.window_size as f64),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{:.0}", app.x_offset),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ];

    let max_y = app.data.iter().map(|(_, y)| *y).fold(0.0, f64::max) + 10.0;

    let chart = Chart::new(dataset)
        .block(Block::default().title("Keys over Time").borders(Borders::ALL))
        .x_axis(
            Axis::default()
                .title("Samples")
                .style(Style::default().fg(Color::Gray))
                .bounds([app.x_offset - app.window_size as f64, app.x_offset])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title("Count")
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, max_y])
                .labels(vec![
                    Span::raw("0"),
                    Span::styled(
                        format!("{:.0}", max_y),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                ]),
        );

    f.render_widget(chart, chunks[1]);
}
