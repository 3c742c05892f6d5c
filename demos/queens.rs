use std::path::PathBuf;

use clap::Parser;
use log::info;

use extdd::bdd::Bdd;
use extdd::config::{Config, MemoryMode};
use extdd::manager::Manager;
use extdd::ptr::Label;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of queens.
    #[arg(value_name = "INT", default_value = "8")]
    n: usize,

    /// Memory budget per operation (in MiB). By default, ask the OS.
    #[clap(long, value_name = "INT")]
    memory: Option<usize>,

    /// Always use the external-memory priority queues.
    #[clap(long)]
    external: bool,

    /// Directory for temporary files.
    #[clap(long, value_name = "DIR")]
    temp_dir: Option<PathBuf>,
}

fn label(n: usize, i: usize, j: usize) -> Label {
    (i * n + j) as Label
}

/// The queen on `(i, j)` and no other queen it could capture.
fn place(mgr: &Manager, n: usize, i: usize, j: usize) -> color_eyre::Result<Bdd> {
    let mut literals = vec![];
    for r in 0..n {
        for c in 0..n {
            let conflict = r == i
                || c == j
                || (r as isize - c as isize) == (i as isize - j as isize)
                || r + c == i + j;
            if r == i && c == j {
                literals.push((label(n, r, c), true));
            } else if conflict {
                literals.push((label(n, r, c), false));
            }
        }
    }
    Ok(mgr.cube(&literals)?)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let mut config = Config::default();
    if let Some(mib) = args.memory {
        config = config.with_memory_limit(mib << 20);
    }
    if args.external {
        config = config.with_memory_mode(MemoryMode::External);
    }
    if let Some(dir) = &args.temp_dir {
        config = config.with_temp_dir(dir);
    }
    let mgr = Manager::new(config);
    println!("mgr = {:?}", mgr);

    // Encode N-queens problem:
    // - every row has a queen
    // - a queen on (i, j) excludes its row, column, and both diagonals
    let n = args.n;
    println!("Encoding n-queens problem with n = {}", n);

    let mut board = mgr.one()?;
    for i in 0..n {
        let mut row = mgr.zero()?;
        for j in 0..n {
            row = mgr.apply_or(&row, &place(&mgr, n, i, j)?)?;
        }
        info!("row {}: {} nodes", i, row.size());
        board = mgr.apply_and(&board, &row)?;
        info!("board after {} rows: {} nodes", i + 1, board.size());
        if board.is_zero() {
            break;
        }
    }

    let solutions = mgr.sat_count(&board, (n * n) as u64)?;
    println!("res of size {}", board.size());
    println!("Solutions: {}", solutions);

    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
