use std::{cell::RefCell, collections::HashMap, io::ErrorKind, path::Path, rc::Rc};

use anyhow::{Context, bail};
pub use cursive;
use cursive::{Cursive, CursiveExt, event::Key, traits::Scrollable, views::Dialog};
use serde_json::Value;

use crate::{
    data::{ConfigSchema, Definition, ParseOptions, ValueStore},
    mask::MaskBuilder,
    ui::{EditSession, arrange, cursive_factory},
};

/// Load a definition file, choosing the format by extension (`json` or `toml`).
///
/// # Errors
///
/// Returns errors when the file cannot be read or does not describe a valid schema.
pub fn load_schema(path: impl AsRef<Path>, opts: &ParseOptions) -> anyhow::Result<ConfigSchema> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let definition = match extension(path).as_str() {
        "json" => Definition::from_json_str(&content)?,
        "toml" => Definition::from_toml_str(&content)?,
        ext => bail!("unsupported definition file extension: {ext}"),
    };
    let schema = ConfigSchema::parse(&definition, opts)
        .with_context(|| format!("Invalid definition {}", path.display()))?;
    Ok(schema)
}

/// Read parser settings (`defaultWidth`, `extraKeys`) from a json or toml file.
pub fn load_options(path: impl AsRef<Path>) -> anyhow::Result<ParseOptions> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let opts = match extension(path).as_str() {
        "json" => serde_json::from_str(&content)?,
        "toml" => toml::from_str(&content)?,
        ext => bail!("unsupported options file extension: {ext}"),
    };
    Ok(opts)
}

/// Read a values file into the store. A missing file leaves the store at its defaults.
///
/// Values are applied atomically: a file with one bad entry changes nothing.
pub fn load_values(store: &mut ValueStore, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = path.as_ref();
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!("{} not found, keeping defaults", path.display());
            return Ok(());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read {}", path.display()));
        }
    };
    let value: Value = match extension(path).as_str() {
        "json" => serde_json::from_str(&content)?,
        "toml" => toml::from_str(&content)?,
        ext => bail!("unsupported values file extension: {ext}"),
    };
    let Value::Object(entries) = value else {
        bail!("{} must hold a table of parameter values", path.display());
    };
    store
        .set_values(entries)
        .with_context(|| format!("Invalid values in {}", path.display()))?;
    Ok(())
}

/// Write the store's values, choosing the format by extension.
pub fn save_values(store: &ValueStore, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = path.as_ref();
    let values = store.to_json();
    let content = match extension(path).as_str() {
        "json" => serde_json::to_string_pretty(&values)?,
        "toml" => toml::to_string_pretty(&values)?,
        ext => bail!("unsupported values file extension: {ext}"),
    };
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Edit a copy of `store` in a settings dialog.
///
/// Returns the edited copy when the user confirms with OK and every control holds a valid
/// value, or `None` when the dialog is cancelled. `store` itself is never modified; merge the
/// result back with [`ValueStore::apply`].
///
/// # Errors
///
/// Returns errors when the mask cannot be built, e.g. for an unknown group.
pub fn run(
    store: &ValueStore,
    title: &str,
    groups: Option<&[&str]>,
) -> anyhow::Result<Option<ValueStore>> {
    let mut draft = store.detached();

    #[cfg(feature = "logging")]
    {
        cursive::logger::init();
        cursive::logger::set_filter_levels_from_env();
    }
    let mut siv = Cursive::default();

    let views = Rc::new(RefCell::new(HashMap::new()));
    let builder = MaskBuilder::new(cursive_factory(siv.cb_sink().clone(), views.clone()));
    let mask = builder.create_mask(&mut draft, groups)?;
    let form = arrange(&mask, &draft, &views);

    siv.set_user_data(EditSession::new(draft, mask));

    siv.add_global_callback(Key::Esc, Cursive::quit);
    siv.add_global_callback('~', Cursive::toggle_debug_console);
    siv.add_layer(
        Dialog::around(form.scrollable())
            .title(title)
            .button("OK", handle_ok)
            .button("Defaults", handle_defaults)
            .button("Cancel", Cursive::quit),
    );

    siv.run();

    let Some(session) = siv.take_user_data::<EditSession>() else {
        bail!("edit session lost");
    };
    if !session.accepted {
        debug!("dialog cancelled");
        return Ok(None);
    }
    let EditSession { mut store, mask, .. } = session;
    mask.detach(&mut store);
    Ok(Some(store))
}

fn handle_ok(siv: &mut Cursive) {
    let result = siv.with_user_data(|session: &mut EditSession| {
        let result = session.commit_all();
        session.accepted = result.is_ok();
        result
    });
    match result {
        Some(Ok(())) => siv.quit(),
        Some(Err(err)) => siv.add_layer(Dialog::info(err.to_string()).title("Invalid value")),
        None => siv.quit(),
    }
}

fn handle_defaults(siv: &mut Cursive) {
    let result = siv.with_user_data(|session: &mut EditSession| session.store.reset(None));
    if let Some(Err(err)) = result {
        error!("reset failed: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ParamValue;

    const DEFINITION: &str = r#"
        [Main.count]
        inputType = "int"
        valueRange = [0, 10]
        initialValue = 3

        [Main.note]
        inputType = "string"
        initialValue = ""
        tooltip = "free text"
    "#;

    fn schema_file(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("params.toml");
        std::fs::write(&path, DEFINITION).unwrap();
        path
    }

    #[test]
    fn test_options_file_enables_extra_keys() {
        let dir = tempfile::tempdir().unwrap();
        let definition = schema_file(dir.path());
        assert!(load_schema(&definition, &ParseOptions::default()).is_err());

        let options = dir.path().join("options.toml");
        std::fs::write(&options, "defaultWidth = 12\nextraKeys = [\"tooltip\"]\n").unwrap();
        let opts = load_options(&options).unwrap();
        assert_eq!(opts.default_width, 12);

        let schema = load_schema(&definition, &opts).unwrap();
        assert_eq!(schema.spec("count").unwrap().width, 12);
        assert!(schema.spec("note").unwrap().control_attributes.contains_key("tooltip"));
    }

    #[test]
    fn test_values_round_trip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let opts = ParseOptions::default().with_extra_key("tooltip");
        let schema = load_schema(schema_file(dir.path()), &opts).unwrap();
        let mut store = ValueStore::new(schema);

        let values = dir.path().join("values.json");
        load_values(&mut store, &values).unwrap();
        assert_eq!(store["count"], ParamValue::Integer(3));

        store.set("count", 7).unwrap();
        save_values(&store, &values).unwrap();
        let mut reloaded = store.detached();
        reloaded.reset(None).unwrap();
        load_values(&mut reloaded, &values).unwrap();
        assert_eq!(reloaded["count"], ParamValue::Integer(7));
    }

    #[test]
    fn test_unreadable_values_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let opts = ParseOptions::default().with_extra_key("tooltip");
        let schema = load_schema(schema_file(dir.path()), &opts).unwrap();
        let mut store = ValueStore::new(schema);

        let values = dir.path().join("values.json");
        std::fs::create_dir(&values).unwrap();
        assert!(load_values(&mut store, &values).is_err());
    }
}
