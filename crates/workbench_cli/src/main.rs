//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `workbench_core` linkage with a deterministic ping.
//! - Create a project in a database file and print its healed tree.
//! - Run a configured search against the database named in a config file.
//!
//! Usage:
//! - `workbench_cli`
//! - `workbench_cli <db-path> <project-title>`
//! - `workbench_cli --config <config.toml> <project-title>`
//! - `workbench_cli --config <config.toml> search <text>`

use rusqlite::Connection;
use std::error::Error;
use std::path::Path;
use std::process::ExitCode;
use workbench_core::{
    init_from_config, open_configured_db, open_db, search, CoreConfig, NewProject,
    ProjectService, ProjectStructure, SearchQuery, SqliteHierarchyRepository,
    SqliteProjectRepository,
};

const USAGE: &str = "usage: workbench_cli [<db-path> <project-title>]
       workbench_cli --config <config.toml> <project-title>
       workbench_cli --config <config.toml> search <text>";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let result: Result<(), Box<dyn Error>> = match args.as_slice() {
        [] => {
            println!("workbench_core ping={}", workbench_core::ping());
            println!("workbench_core version={}", workbench_core::core_version());
            Ok(())
        }
        [flag, config_path, command, text] if flag == "--config" && command == "search" => {
            load_config(Path::new(config_path))
                .and_then(|config| search_and_print(&config, text))
        }
        [flag, config_path, title] if flag == "--config" => load_config(Path::new(config_path))
            .and_then(|config| {
                let conn = open_configured_db(&config)?;
                create_and_print(&conn, title)
            }),
        [db_path, title] => open_db(Path::new(db_path))
            .map_err(Into::into)
            .and_then(|conn| create_and_print(&conn, title)),
        _ => {
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &Path) -> Result<CoreConfig, Box<dyn Error>> {
    let config = CoreConfig::load(path)?;
    init_from_config(&config)?;
    Ok(config)
}

fn create_and_print(conn: &Connection, title: &str) -> Result<(), Box<dyn Error>> {
    let service = ProjectService::new(
        SqliteProjectRepository::try_new(conn)?,
        SqliteHierarchyRepository::try_new(conn)?,
    );

    let created = service.create_project(&NewProject::new(title, ProjectStructure::default()))?;
    let tree = service.project_tree(created.project.id)?;
    println!("project_id={}", created.project.id);
    println!("entry_id={}", created.entry_id);
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}

fn search_and_print(config: &CoreConfig, text: &str) -> Result<(), Box<dyn Error>> {
    let conn = open_configured_db(config)?;
    let query = SearchQuery::from_params(Some(text), None, None, Some("all"))?
        .with_settings(&config.search);
    let hits = search(&conn, &query)?;
    println!("{}", serde_json::to_string_pretty(&hits)?);
    Ok(())
}
