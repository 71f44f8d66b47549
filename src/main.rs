//! Archaeology Material Calculator
//!
//! Totals the materials needed for a list of artefacts and nets them against
//! what is already in storage.

mod calculator;
mod catalog;
mod db;
mod error;
mod import;
mod models;
mod persistence;
mod search;
mod state;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

use crate::catalog::Catalog;
use crate::error::CalcError;
use crate::models::{Artefact, Material};
use crate::persistence::{KeyValueStore, SessionStore, SqliteStore};

#[derive(Parser)]
#[command(name = "archaeology-calculator")]
#[command(about = "Material requirement calculator for the Archaeology skill")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "archaeology.db", env = "ARCH_CALC_DB")]
    database: PathBuf,

    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Import materials.json and artefacts.json found under a directory
    Import {
        /// Directory to search for the dataset files
        data_dir: PathBuf,

        /// Clear the existing catalog before importing
        #[arg(long)]
        clear: bool,
    },

    /// Load a small sample catalog for testing (without the datasets)
    LoadSample,

    /// Search artefacts by name or id
    Search {
        /// Free text, e.g. "venator dag"
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Add one of an artefact to the selection
    Add {
        /// Artefact ID
        artefact: String,
    },

    /// Set how many of a selected artefact to make
    SetQty {
        /// Artefact ID
        artefact: String,

        /// New quantity (negative or non-numeric values become 0)
        #[arg(allow_hyphen_values = true)]
        qty: String,
    },

    /// Remove an artefact from the selection
    Remove {
        /// Artefact ID
        artefact: String,
    },

    /// Remove every artefact from the selection
    Clear,

    /// Spend the materials for one artefact and take it off the selection
    Craft {
        /// Artefact ID
        artefact: String,
    },

    /// Show the selected artefacts
    Selection,

    /// Show the materials needed for the selection, net of storage
    Receipt {
        /// Show the per-artefact breakdown (remembered)
        #[arg(long, conflicts_with = "no_breakdown")]
        breakdown: bool,

        /// Hide the per-artefact breakdown (remembered)
        #[arg(long)]
        no_breakdown: bool,
    },

    /// Track materials already in storage
    #[command(subcommand)]
    Storage(StorageCommand),

    /// Show or change view preferences
    #[command(subcommand)]
    Prefs(PrefsCommand),

    /// List all materials in the catalog
    ListMaterials,

    /// List all artefacts in the catalog
    ListArtefacts,

    /// Show details for a specific artefact
    Artefact {
        /// Artefact ID
        id: String,
    },

    /// Show details for a specific material
    Material {
        /// Material ID
        id: String,
    },
}

#[derive(Subcommand)]
enum StorageCommand {
    /// List stored materials
    List,

    /// Set the stored count of a material
    Set {
        /// Material ID
        material: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Add to (or, if negative, take from) a stored count
    Add {
        /// Material ID
        material: String,
        #[arg(allow_hyphen_values = true)]
        delta: String,
    },

    /// Apply the quick step to a stored count
    Step {
        /// Material ID
        material: String,

        /// Subtract the step instead of adding it
        #[arg(long)]
        down: bool,
    },

    /// Reset every stored count to 0
    Clear {
        /// Don't ask for confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum PrefsCommand {
    /// Print the current preferences
    Show,

    /// Change one or more preferences
    Set {
        #[arg(long)]
        show_breakdown: Option<bool>,

        /// Only list materials the selection needs when false
        #[arg(long)]
        show_all: Option<bool>,

        /// Amount `storage step` adds or subtracts (0 to 9999)
        #[arg(long, allow_hyphen_values = true)]
        quick_step: Option<String>,

        #[arg(long)]
        storage_open: Option<bool>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let conn = Connection::open(&cli.database)
        .with_context(|| format!("Failed to open database {}", cli.database.display()))?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::Import { data_dir, clear } => {
            let stats = import::import_to_database(&conn, &data_dir, clear)?;
            println!("{}", stats);
        }

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }

        command => {
            let catalog = load_catalog(&conn)?;
            let mut session = SessionStore::new(SqliteStore::new(&conn));
            run_session_command(command, &catalog, &mut session)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "archaeology_calculator=debug"
    } else {
        "archaeology_calculator=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let catalog = db::load_catalog(conn).context("Failed to load catalog")?;
    if catalog.is_empty() {
        tracing::warn!("catalog is empty; run 'import' or 'load-sample' first");
    }
    for (artefact, material) in catalog.dangling_requirements() {
        tracing::debug!(artefact, material, "requirement names an unknown material");
    }
    Ok(catalog)
}

fn run_session_command<S: KeyValueStore>(
    command: Commands,
    catalog: &Catalog,
    session: &mut SessionStore<S>,
) -> Result<()> {
    match command {
        Commands::Search { query } => {
            let results = search::rank(catalog, &query.join(" "));
            if results.is_empty() {
                println!("No results.");
            }
            for artefact in results {
                println!("{:<32} {:<36} Lvl. {}", artefact.id, artefact.name, artefact.level);
            }
        }

        Commands::Add { artefact } => {
            let artefact = resolve_artefact(catalog, &artefact)?;
            let selection = session.load_selection().add(&artefact.id);
            session.save_selection(&selection);
            println!(
                "Added {} (x{})",
                artefact.name,
                selection.quantity(&artefact.id).unwrap_or(1)
            );
        }

        Commands::SetQty { artefact, qty } => {
            let qty = set_selected_quantity(session, &artefact, &qty)?;
            println!("{} x{}", artefact_label(catalog, &artefact), qty);
        }

        Commands::Remove { artefact } => {
            let selection = session.load_selection();
            if selection.quantity(&artefact).is_none() {
                println!("'{}' is not in the selection", artefact);
            } else {
                session.save_selection(&selection.remove(&artefact));
                println!("Removed {}", artefact_label(catalog, &artefact));
            }
        }

        Commands::Clear => {
            session.clear_selection();
            println!("Selection cleared.");
        }

        Commands::Craft { artefact } => {
            let artefact = resolve_artefact(catalog, &artefact)?;
            match craft_one(catalog, session, &artefact.id)? {
                Some(left) => println!("Crafted one {} ({} still selected)", artefact.name, left),
                None => println!("Crafted one {}", artefact.name),
            }
        }

        Commands::Selection => {
            let selection = session.load_selection();
            if selection.is_empty() {
                println!("No artefacts selected yet.");
            }
            for entry in selection.entries() {
                match catalog.artefact(&entry.artefact_id) {
                    Some(a) => println!("{:>6}x {} (Lvl. {})", entry.qty, a.name, a.level),
                    None => println!("{:>6}x {} (unknown artefact)", entry.qty, entry.artefact_id),
                }
            }
        }

        Commands::Receipt {
            breakdown,
            no_breakdown,
        } => {
            let mut prefs = session.load_preferences();
            if breakdown || no_breakdown {
                prefs.show_breakdown = breakdown;
                session.save_preferences(&prefs);
            }

            let receipt = calculator::build_receipt(
                catalog,
                &session.load_selection(),
                &session.load_inventory(),
                prefs.show_breakdown,
            );
            print!("{}", receipt);
        }

        Commands::Storage(command) => run_storage_command(command, catalog, session)?,

        Commands::Prefs(PrefsCommand::Show) => {
            print_preferences(&session.load_preferences());
        }

        Commands::Prefs(PrefsCommand::Set {
            show_breakdown,
            show_all,
            quick_step,
            storage_open,
        }) => {
            let mut prefs = session.load_preferences();
            if let Some(value) = show_breakdown {
                prefs.show_breakdown = value;
            }
            if let Some(value) = show_all {
                prefs.show_all_materials = value;
            }
            if let Some(raw) = quick_step {
                prefs = prefs.with_quick_step(parse_number(&raw));
            }
            if let Some(value) = storage_open {
                prefs.storage_open = value;
            }
            session.save_preferences(&prefs);
            print_preferences(&prefs);
        }

        Commands::ListMaterials => {
            if catalog.materials().is_empty() {
                println!("No materials in database. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:<30} {:>5}  {}", "Material", "Level", "Locations");
                println!("{}", "-".repeat(60));
                for m in catalog.materials() {
                    let locations: Vec<_> = m.locations.iter().map(|l| l.location.as_str()).collect();
                    println!("{:<30} {:>5}  {}", m.name, m.level, locations.join(", "));
                }
            }
        }

        Commands::ListArtefacts => {
            if catalog.artefacts().is_empty() {
                println!("No artefacts in database. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:<32} {:>5}  {}", "Artefact", "Level", "Materials");
                println!("{}", "-".repeat(72));
                for a in catalog.artefacts() {
                    println!("{:<32} {:>5}  {}", a.name, a.level, requirement_summary(catalog, a));
                }
            }
        }

        Commands::Artefact { id } => match catalog.artefact(&id) {
            Some(a) => print_artefact(catalog, a),
            None => println!("Artefact '{}' not found", id),
        },

        Commands::Material { id } => match catalog.material(&id) {
            Some(m) => print_material(catalog, m),
            None => println!("Material '{}' not found", id),
        },

        Commands::Init | Commands::Import { .. } | Commands::LoadSample => {
            unreachable!("handled before the catalog is loaded")
        }
    }

    Ok(())
}

/// Set a selected artefact's quantity from user input, returning the stored value
fn set_selected_quantity<S: KeyValueStore>(
    session: &mut SessionStore<S>,
    artefact_id: &str,
    raw: &str,
) -> Result<u32> {
    let selection = session.load_selection();
    if selection.quantity(artefact_id).is_none() {
        bail!("'{}' is not in the selection", artefact_id);
    }
    let selection = selection.set_quantity(artefact_id, parse_number(raw));
    session.save_selection(&selection);
    Ok(selection.quantity(artefact_id).unwrap_or(0))
}

/// Spend storage for one artefact and take it off the selection.
///
/// Returns how many are still selected, or `None` once the entry is gone.
fn craft_one<S: KeyValueStore>(
    catalog: &Catalog,
    session: &mut SessionStore<S>,
    artefact_id: &str,
) -> Result<Option<u32>> {
    let inventory = session.load_inventory().craft(catalog, artefact_id)?;
    let selection = session.load_selection().decrement(artefact_id);
    session.save_inventory(&inventory);
    session.save_selection(&selection);
    Ok(selection.quantity(artefact_id))
}

fn run_storage_command<S: KeyValueStore>(
    command: StorageCommand,
    catalog: &Catalog,
    session: &mut SessionStore<S>,
) -> Result<()> {
    let inventory = session.load_inventory();

    let (material, next) = match command {
        StorageCommand::List => {
            let prefs = session.load_preferences();
            if !prefs.storage_open {
                println!("Materials Storage (collapsed; `prefs set --storage-open true` to expand)");
                return Ok(());
            }

            let selection = session.load_selection();
            let materials =
                calculator::storage_materials(catalog, &selection, prefs.show_all_materials);
            println!("Materials Storage (quick step: {})", prefs.quick_step);
            if !prefs.show_all_materials {
                println!("Showing {} relevant", materials.len());
            }
            if inventory.is_empty() {
                println!("Nothing stored yet.");
            }
            for m in materials {
                println!("  {:<30} Lvl. {:>3} {:>8}", m.name, m.level, inventory.get(&m.id));
            }
            for (id, count) in inventory.iter().filter(|(id, _)| catalog.material(id).is_none()) {
                println!("  {:<30} (not in catalog) {:>8}", id, count);
            }
            return Ok(());
        }

        StorageCommand::Set { material, value } => {
            let material = resolve_material(catalog, &material)?;
            let Some(value) = parse_finite(&value) else {
                println!("'{}' is not a number; storage unchanged", value);
                return Ok(());
            };
            (material, inventory.set(&material.id, value))
        }

        StorageCommand::Add { material, delta } => {
            let material = resolve_material(catalog, &material)?;
            let Some(delta) = parse_finite(&delta) else {
                println!("'{}' is not a number; storage unchanged", delta);
                return Ok(());
            };
            (material, inventory.apply_delta(&material.id, delta))
        }

        StorageCommand::Step { material, down } => {
            let material = resolve_material(catalog, &material)?;
            let step = f64::from(session.load_preferences().quick_step);
            let delta = if down { -step } else { step };
            (material, inventory.apply_delta(&material.id, delta))
        }

        StorageCommand::Clear { yes } => {
            let confirmed = yes
                || confirm(
                    "Are you sure you want to clear Materials Storage?\n\
                     This will reset every material count to 0.",
                )?;
            if confirmed {
                session.clear_inventory();
                println!("Materials Storage cleared.");
            } else {
                println!("Storage left unchanged.");
            }
            return Ok(());
        }
    };

    session.save_inventory(&next);
    println!("{}: {}", material.name, next.get(&material.id));
    Ok(())
}

/// Parse user-entered numbers; anything unparsable becomes NaN so it clamps to 0.
fn parse_number(raw: &str) -> f64 {
    raw.trim().parse().unwrap_or(f64::NAN)
}

fn parse_finite(raw: &str) -> Option<f64> {
    Some(parse_number(raw)).filter(|n| n.is_finite())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn resolve_artefact<'a>(catalog: &'a Catalog, id: &str) -> Result<&'a Artefact> {
    if let Some(artefact) = catalog.artefact(id) {
        return Ok(artefact);
    }
    if let Some(best) = search::rank_ids(catalog, id).first() {
        eprintln!("Did you mean '{}' ({})?", best, artefact_label(catalog, best));
    }
    Err(CalcError::UnknownArtefact(id.to_string()).into())
}

fn resolve_material<'a>(catalog: &'a Catalog, id: &str) -> Result<&'a Material> {
    catalog
        .material(id)
        .ok_or_else(|| CalcError::UnknownMaterial(id.to_string()).into())
}

fn artefact_label(catalog: &Catalog, id: &str) -> String {
    catalog
        .artefact(id)
        .map_or_else(|| id.to_string(), |a| a.name.clone())
}

fn requirement_summary(catalog: &Catalog, artefact: &Artefact) -> String {
    artefact
        .materials_required
        .iter()
        .map(|r| format!("{}x {}", r.qty, catalog.material_name(&r.material_id)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_artefact(catalog: &Catalog, a: &Artefact) {
    println!("Artefact: {}", a.name);
    println!("  ID: {}", a.id);
    println!("  Level: {}", a.level);
    println!("  XP: {}", a.xp);
    println!("  Chronotes: {}", a.chronote_value);
    if !a.god.is_empty() {
        println!("  God: {}", a.god);
    }
    if !a.source.is_empty() {
        println!("  Source: {}", a.source);
    }
    if !a.collections.is_empty() {
        println!("  Collections: {}", a.collections.join(", "));
    }
    if a.other_uses > 0 {
        println!("  Other uses: {} ({})", a.other_uses, a.other_uses_notes);
    }
    if !a.materials_required.is_empty() {
        println!("  Materials:");
        for r in &a.materials_required {
            println!("    {:>4}x {}", r.qty, catalog.material_name(&r.material_id));
        }
    }
}

fn print_material(catalog: &Catalog, m: &Material) {
    println!("Material: {}", m.name);
    println!("  ID: {}", m.id);
    println!("  Level: {}", m.level);
    if !m.locations.is_empty() {
        println!("  Locations:");
        for l in &m.locations {
            if l.requirement.is_empty() {
                println!("    {}", l.location);
            } else {
                println!("    {} (requires {})", l.location, l.requirement.join(", "));
            }
        }
    }

    let users: Vec<_> = catalog
        .artefacts()
        .iter()
        .filter(|a| a.materials_required.iter().any(|r| r.material_id == m.id))
        .map(|a| a.name.as_str())
        .collect();
    if !users.is_empty() {
        println!("  Used by: {}", users.join(", "));
    }
}

fn print_preferences(prefs: &state::Preferences) {
    println!("show-breakdown: {}", prefs.show_breakdown);
    println!("show-all:       {}", prefs.show_all_materials);
    println!("quick-step:     {}", prefs.quick_step);
    println!("storage-open:   {}", prefs.storage_open);
}

/// Load a sample archaeology catalog for testing without the datasets
fn load_sample_data(conn: &Connection) -> Result<()> {
    use crate::models::{MaterialLocation, MaterialRequirement};

    db::clear_catalog(conn)?;

    let materials = [
        ("third_age_iron", "Third Age iron", 1, "Kharid-et"),
        ("zarosian_insignia", "Zarosian insignia", 1, "Kharid-et"),
        ("samite_silk", "Samite silk", 5, "Everlight"),
        ("imperial_steel", "Imperial steel", 12, "Kharid-et"),
        ("white_oak", "White oak", 17, "Everlight"),
        ("goldrune", "Goldrune", 24, "Everlight"),
        ("vellum", "Vellum", 24, "Infernal Source"),
        ("cadmium_red", "Cadmium red", 24, "Infernal Source"),
    ];
    for (position, (id, name, level, location)) in materials.into_iter().enumerate() {
        let material = Material {
            id: id.to_string(),
            name: name.to_string(),
            level,
            locations: vec![MaterialLocation {
                location: location.to_string(),
                requirement: vec![format!("Level {}", level)],
            }],
        };
        db::upsert_material(conn, &material, position)?;
    }

    let artefacts: [(&str, &str, u32, f64, u32, &str, &str, &[(&str, u32)]); 6] = [
        (
            "venator_dagger",
            "Venator dagger",
            5,
            17.5,
            34,
            "Zaros",
            "Kharid-et",
            &[("third_age_iron", 16), ("zarosian_insignia", 12)],
        ),
        (
            "venator_light_crossbow",
            "Venator light crossbow",
            5,
            17.5,
            34,
            "Zaros",
            "Kharid-et",
            &[("third_age_iron", 12), ("zarosian_insignia", 16)],
        ),
        (
            "legionary_gladius",
            "Legionary gladius",
            12,
            26.6,
            44,
            "Zaros",
            "Kharid-et",
            &[("third_age_iron", 10), ("zarosian_insignia", 12), ("imperial_steel", 6)],
        ),
        (
            "primis_elementis_standard",
            "Primis Elementis standard",
            12,
            26.6,
            44,
            "Zaros",
            "Kharid-et",
            &[("samite_silk", 16), ("third_age_iron", 12)],
        ),
        (
            "hookah_pipe",
            "Hookah pipe",
            29,
            60.0,
            72,
            "Zamorak",
            "Infernal Source",
            &[("third_age_iron", 10), ("goldrune", 12), ("cadmium_red", 8)],
        ),
        (
            "ekeleshuun_blinder_mask",
            "'Ekeleshuun' blinder mask",
            29,
            60.0,
            72,
            "Zamorak",
            "Infernal Source",
            &[("vellum", 12), ("cadmium_red", 10), ("white_oak", 8)],
        ),
    ];
    for (position, (id, name, level, xp, chronotes, god, source, required)) in
        artefacts.into_iter().enumerate()
    {
        let artefact = Artefact {
            id: id.to_string(),
            name: name.to_string(),
            level,
            xp,
            chronote_value: chronotes,
            materials_required: required
                .iter()
                .map(|(material_id, qty)| MaterialRequirement {
                    material_id: material_id.to_string(),
                    qty: *qty,
                })
                .collect(),
            collections: Vec::new(),
            other_uses: 0,
            other_uses_notes: String::new(),
            god: god.to_string(),
            source: source.to_string(),
        };
        db::upsert_artefact(conn, &artefact, position)?;
    }

    println!(
        "Loaded {} sample materials and {} sample artefacts",
        materials.len(),
        artefacts.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Inventory, Selection};

    fn sample_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        load_sample_data(&conn).unwrap();
        conn
    }

    #[test]
    fn test_craft_spends_storage_and_decrements_selection() {
        let conn = sample_db();
        let catalog = load_catalog(&conn).unwrap();
        let mut session = SessionStore::new(SqliteStore::new(&conn));
        session.save_selection(&Selection::default().add("venator_dagger").add("venator_dagger"));
        session.save_inventory(
            &Inventory::default()
                .set("third_age_iron", 20.0)
                .set("zarosian_insignia", 12.0),
        );

        assert_eq!(craft_one(&catalog, &mut session, "venator_dagger").unwrap(), Some(1));
        let inventory = session.load_inventory();
        assert_eq!(inventory.get("third_age_iron"), 4);
        assert_eq!(inventory.get("zarosian_insignia"), 0);

        // short on both materials now: nothing changes
        assert!(craft_one(&catalog, &mut session, "venator_dagger").is_err());
        assert_eq!(session.load_selection().quantity("venator_dagger"), Some(1));
        assert_eq!(session.load_inventory(), inventory);
    }

    #[test]
    fn test_crafting_the_last_one_removes_the_entry() {
        let conn = sample_db();
        let catalog = load_catalog(&conn).unwrap();
        let mut session = SessionStore::new(SqliteStore::new(&conn));
        session.save_selection(&Selection::default().add("venator_dagger"));
        session.save_inventory(
            &Inventory::default()
                .set("third_age_iron", 16.0)
                .set("zarosian_insignia", 12.0),
        );

        assert_eq!(craft_one(&catalog, &mut session, "venator_dagger").unwrap(), None);
        assert!(session.load_selection().is_empty());
    }

    #[test]
    fn test_set_quantity_from_user_input() {
        let conn = sample_db();
        let mut session = SessionStore::new(SqliteStore::new(&conn));
        session.save_selection(&Selection::default().add("hookah_pipe"));

        assert_eq!(set_selected_quantity(&mut session, "hookah_pipe", "7.9").unwrap(), 7);
        assert_eq!(set_selected_quantity(&mut session, "hookah_pipe", "lots").unwrap(), 0);
        assert_eq!(session.load_selection().quantity("hookah_pipe"), Some(0));
        assert_eq!(set_selected_quantity(&mut session, "hookah_pipe", "-3").unwrap(), 0);
        assert!(set_selected_quantity(&mut session, "venator_dagger", "2").is_err());
    }

    #[test]
    fn test_session_commands_against_sqlite() {
        let conn = sample_db();
        let catalog = load_catalog(&conn).unwrap();
        let mut session = SessionStore::new(SqliteStore::new(&conn));
        assert!(session.load_inventory().is_empty());
        run_session_command(Commands::Storage(StorageCommand::List), &catalog, &mut session)
            .unwrap();

        let add = || Commands::Add {
            artefact: "hookah_pipe".to_string(),
        };
        run_session_command(add(), &catalog, &mut session).unwrap();
        run_session_command(add(), &catalog, &mut session).unwrap();
        assert_eq!(session.load_selection().quantity("hookah_pipe"), Some(2));

        let err = run_session_command(
            Commands::Craft {
                artefact: "hookah_pip".to_string(),
            },
            &catalog,
            &mut session,
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CalcError>(),
            Some(CalcError::UnknownArtefact(_))
        ));

        let step = |down| {
            Commands::Storage(StorageCommand::Step {
                material: "goldrune".to_string(),
                down,
            })
        };
        run_session_command(step(false), &catalog, &mut session).unwrap();
        assert_eq!(session.load_inventory().get("goldrune"), 100);
        run_session_command(step(true), &catalog, &mut session).unwrap();
        run_session_command(step(true), &catalog, &mut session).unwrap();
        assert_eq!(session.load_inventory().get("goldrune"), 0);

        run_session_command(Commands::Clear, &catalog, &mut session).unwrap();
        assert!(session.load_selection().is_empty());
    }
}
