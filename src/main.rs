// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use seqshare::config::Settings;
use seqshare::editor::{Applied, Editor};
use seqshare::engine::{transport, Engine as _};
use seqshare::grid::{GridState, Note, STEPS};
use seqshare::instrument::InstrumentType;
use seqshare::preview::Preview;
use seqshare::sharing::Reconciler;
use seqshare::store::{http::Client, LocationId, SampleId, Store as _};
use seqshare::sync::Loader;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A step sequencer for composing and sharing music samples."
)]
struct Cli {
    /// The path to the settings file. Settings can also come from SEQSHARE_* variables.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists every stored sample.
    Samples {},
    /// Prints a sample's grid.
    Show {
        /// The sample ID.
        id: SampleId,
    },
    /// Creates and saves a new sample.
    Create {
        /// The name of the sample.
        #[arg(short, long)]
        name: String,
        /// The instrument to play the sample with.
        #[arg(short, long)]
        instrument: Option<InstrumentType>,
        /// The enabled steps. Should be in the form <NOTE>:<STEP>,...;...
        /// For example, C:0,4;E:8 enables C on steps 0 and 4 and E on step 8.
        #[arg(short, long)]
        steps: Option<String>,
    },
    /// Flips one cell of a stored sample and saves it.
    Toggle {
        /// The sample ID.
        id: SampleId,
        /// The note row, C through B.
        note: Note,
        /// The step, 0 through 15.
        step: usize,
    },
    /// Plays a sample once through the transport.
    Preview {
        /// The sample ID.
        id: SampleId,
    },
    /// Lists the locations a sample can be shared at.
    Locations {
        /// The sample ID.
        id: SampleId,
    },
    /// Shares a sample at a location.
    Share {
        /// The sample ID.
        id: SampleId,
        /// The location ID.
        location: LocationId,
    },
    /// Stops sharing a sample at a location.
    Unshare {
        /// The sample ID.
        id: SampleId,
        /// The location ID.
        location: LocationId,
    },
    /// Lists the instruments and the sampler files behind them.
    Instruments {},
}

/// Parses a step list like C:0,4;E:8 into a grid.
fn parse_steps(steps: &str) -> Result<GridState, Box<dyn Error>> {
    let mut grid = GridState::default();
    for row in steps.split(';').map(str::trim).filter(|row| !row.is_empty()) {
        let (note, steps) = row
            .split_once(':')
            .ok_or_else(|| format!("expected <NOTE>:<STEP>,... but found {}", row))?;
        let note: Note = note.parse()?;
        for step in steps.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let step: usize = step.parse()?;
            if step >= STEPS {
                return Err(
                    format!("step {} is out of range, must be below {}", step, STEPS).into(),
                );
            }
            grid = grid.with_step(note, step, true);
        }
    }
    Ok(grid)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Commands::Instruments {} = cli.command {
        for instrument in InstrumentType::ALL {
            let voices = instrument.voices();
            println!(
                "{} ({}), samples from {}:",
                instrument.display_name(),
                instrument,
                voices.base_path
            );
            for (pitch, file) in voices.files {
                println!("- {} => {}", pitch, file);
            }
        }
        return Ok(());
    }

    let settings = Settings::load(cli.config.as_deref())?;
    let store = Arc::new(Client::new(settings.base_url(), settings.api_key()));
    let engine = Arc::new(transport::Engine::new("transport", settings.tempo_bpm())?);
    let preview = Arc::new(Preview::new(engine.clone()));
    let loader = Loader::new(store.clone(), settings.default_instrument());
    let reconciler = Reconciler::new(store.clone());

    match cli.command {
        Commands::Samples {} => {
            let samples = store.list_samples().await?;
            if samples.is_empty() {
                println!("No samples found.");
                return Ok(());
            }

            println!("Samples (count: {}):", samples.len());
            for sample in samples {
                let instrument = InstrumentType::from_type_str(sample.instrument_type.as_deref());
                println!(
                    "- {}: {} ({}) {}",
                    sample.id.unwrap_or_default(),
                    sample.name,
                    instrument,
                    sample.datetime.unwrap_or_default()
                );
            }
        }
        Commands::Show { id } => {
            let loaded = loader.load(Some(id)).await;
            if let Some(e) = &loaded.error {
                println!("Unable to load sample {}, showing an empty grid: {}", id, e);
            }
            println!("{} ({})", loaded.name, loaded.instrument);
            print!("{}", loaded.grid);
        }
        Commands::Create {
            name,
            instrument,
            steps,
        } => {
            let grid = match steps {
                Some(steps) => parse_steps(&steps)?,
                None => GridState::default(),
            };

            let mut editor = Editor::new(
                preview.clone(),
                instrument.unwrap_or(settings.default_instrument()),
            );
            editor.set_name(&name)?;
            for (note, step) in grid.enabled_cells() {
                editor.toggle(note, step)?;
            }
            let id = editor.save(store.as_ref()).await?;
            println!("Created sample {}.", id);
        }
        Commands::Toggle { id, note, step } => {
            let mut editor = Editor::new(preview.clone(), settings.default_instrument());
            if let Applied::Recovered(e) = editor.open(&loader, Some(id)).await {
                // Saving now would overwrite the stored sample with defaults.
                return Err(e.into());
            }
            let enabled = editor.toggle(note, step)?;
            editor.save(store.as_ref()).await?;
            println!(
                "{} step {} is now {}.",
                note.pitch(),
                step,
                if enabled { "on" } else { "off" }
            );
        }
        Commands::Preview { id } => {
            let mut editor = Editor::new(preview.clone(), settings.default_instrument());
            if let Applied::Recovered(e) = editor.open(&loader, Some(id)).await {
                return Err(e.into());
            }

            let mut triggers = engine.subscribe();
            let session = editor.preview()?;
            let mut ended = tokio::task::spawn_blocking(move || session.wait());
            loop {
                tokio::select! {
                    state = &mut ended => {
                        println!("Preview {:?}.", state?);
                        break;
                    }
                    trigger = triggers.recv() => match trigger {
                        Ok(trigger) => println!(
                            "{:>5.2} {} {}",
                            engine.now(),
                            trigger.instrument,
                            trigger.pitch
                        ),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        }
        Commands::Locations { id } => {
            let listing = reconciler.share_listing(id).await?;
            if listing.is_empty() {
                println!("No locations accept shared samples.");
                return Ok(());
            }

            println!("Locations (count: {}):", listing.len());
            for option in listing {
                let location = option.location;
                println!(
                    "- [{}] {}: {} ({}, {})",
                    if option.shared { "x" } else { " " },
                    location.id,
                    location.name,
                    location.latitude.map(|l| l.to_string()).unwrap_or_default(),
                    location.longitude.map(|l| l.to_string()).unwrap_or_default()
                );
            }
        }
        Commands::Share { id, location } => {
            reconciler.set_shared(id, location, true).await?;
            println!("Sample {} is shared at location {}.", id, location);
        }
        Commands::Unshare { id, location } => {
            reconciler.set_shared(id, location, false).await?;
            println!("Sample {} is no longer shared at location {}.", id, location);
        }
        Commands::Instruments {} => {}
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use seqshare::grid::Note;

    use super::parse_steps;

    #[test]
    fn test_parse_steps() {
        let grid = parse_steps("C:0,4; e:8;").expect("steps parse");
        let cells: Vec<(Note, usize)> = grid.enabled_cells().collect();
        assert_eq!(vec![(Note::C, 0), (Note::C, 4), (Note::E, 8)], cells);

        assert!(parse_steps("C:16").is_err());
        assert!(parse_steps("H:1").is_err());
        assert!(parse_steps("C0").is_err());
    }
}
