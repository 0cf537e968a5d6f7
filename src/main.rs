use clap::{Parser, Subcommand};
use mosaic::compositor::Opacity;
use mosaic::dispatch::{self, WatchConfig};
use mosaic::overlay::{self, JobOutcome, OverlayJob};
use mosaic::{codec, cut};
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mosaic")]
#[command(about = "Cut images into grid cells and composite incoming photos against them")]
#[command(long_about = "\
Cut images into grid cells and composite incoming photos against them

The pipeline has two halves:

  cut      partition one image into a rows x cols grid of cell files
           (R<row>C<col>.<ext>) that later overlay jobs draw from

  overlay  blend one photo, at a given opacity, beneath a randomly chosen
           cell from the pool; the consumed cell's file moves into the
           pool's processed/ directory so it is never reused

  watch    run overlay jobs automatically for every image file created in
           an input folder, one at a time, until stdin closes (Ctrl-D)

Cell folders are scanned recursively; supported formats are JPEG and PNG.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Cut an image into a rows x cols grid of cell files
    Cut {
        /// Source image (.jpg, .jpeg or .png)
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        rows: u32,
        #[arg(long)]
        cols: u32,
        /// Directory the cells are written into (created if absent)
        #[arg(long, default_value = "cells")]
        output: PathBuf,
    },
    /// Run a single overlay job for one input image
    Overlay {
        /// Input photo to composite
        #[arg(long)]
        input: PathBuf,
        /// Folder holding the cell pool
        #[arg(long, default_value = "cells")]
        cells: PathBuf,
        /// Folder the composited image is written into
        #[arg(long, default_value = "output")]
        output: PathBuf,
        /// Blend intensity of the cell over the photo, 0.0 to 1.0
        #[arg(long, default_value_t = 0.5)]
        opacity: f64,
    },
    /// Watch a folder and overlay every newly created image file
    Watch {
        /// Folder to watch for new photos (non-recursive)
        #[arg(long)]
        input: PathBuf,
        /// Folder holding the cell pool
        #[arg(long, default_value = "cells")]
        cells: PathBuf,
        /// Folder composited images are written into
        #[arg(long, default_value = "output")]
        output: PathBuf,
        /// Blend intensity of the cell over the photo, 0.0 to 1.0
        #[arg(long, default_value_t = 0.5)]
        opacity: f64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Cut {
            image,
            rows,
            cols,
            output,
        } => {
            let dir = cut::cut_into_grid(&image, rows, cols, &output)?;
            println!("{} cells written to {}", rows * cols, dir.display());
        }
        Command::Overlay {
            input,
            cells,
            output,
            opacity,
        } => {
            if !codec::is_supported(&input) {
                return Err(format!("unsupported input file: {}", input.display()).into());
            }
            let job = OverlayJob {
                input_file: input,
                cell_folder: cells,
                output_folder: output,
                opacity: Opacity::new(opacity)?,
            };
            match overlay::run(&job)? {
                JobOutcome::NoCells => println!("No cells available, nothing to do"),
                JobOutcome::Composited {
                    cells_consumed,
                    output_path,
                    output_written,
                } => {
                    if output_written {
                        println!(
                            "Composited {} cell(s) -> {}",
                            cells_consumed,
                            output_path.display()
                        );
                    } else {
                        println!(
                            "Composited {} cell(s), but writing {} failed (see log)",
                            cells_consumed,
                            output_path.display()
                        );
                    }
                }
            }
        }
        Command::Watch {
            input,
            cells,
            output,
            opacity,
        } => {
            let handle = dispatch::start_overlay_watch(WatchConfig {
                cell_folder: cells,
                input_folder: input.clone(),
                output_folder: output,
                opacity,
            })?;
            println!("Watching {} (Ctrl-D to stop)", input.display());

            // Block until stdin closes, then stop cleanly: the watch ends,
            // the queue drains, and any in-flight job finishes.
            let mut sink = Vec::new();
            let _ = std::io::stdin().read_to_end(&mut sink);
            handle.stop();
            println!("Dispatcher stopped");
        }
    }

    Ok(())
}
