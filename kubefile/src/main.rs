//! Convert the files declared by a workload into Kubernetes manifests.

use kubefile_common::{
    expand::Expander,
    files::ContainerFileConverter,
    fs::LocalFs,
    manifest::render_manifests,
    placeholders::ValuesExpander,
    prelude::*,
    quick_main,
    secret::MagicSecretCodec,
    tracing_support::initialize_tracing,
    workload::{convert_workload_files, Workload},
};
use structopt::StructOpt;

/// Command-line options, parsed using `structopt`.
#[derive(Debug, StructOpt)]
#[structopt(about = "Turns container files into Kubernetes ConfigMaps and volumes.")]
enum Opt {
    /// Convert a workload file and print the resulting manifests.
    #[structopt(name = "convert")]
    Convert {
        /// Path to a workload YAML file.
        #[structopt(parse(from_os_str))]
        workload: PathBuf,

        /// YAML file with values for `${...}` placeholders.
        #[structopt(long = "values", parse(from_os_str))]
        values: Option<PathBuf>,

        /// Don't expand placeholders in any file. Binary files can only be
        /// mounted this way, or by setting `noExpand: true` on the file.
        #[structopt(long = "no-expand")]
        no_expand: bool,
    },
}

quick_main!(run);

fn run() -> Result<()> {
    initialize_tracing();
    let opt = Opt::from_args();
    debug!("Args: {:?}", opt);

    match opt {
        Opt::Convert {
            workload,
            values,
            no_expand,
        } => convert(&workload, values.as_deref(), no_expand),
    }
}

/// The `convert` subcommand.
fn convert(workload_path: &Path, values: Option<&Path>, no_expand: bool) -> Result<()> {
    let f = std::fs::File::open(workload_path)
        .with_context(|| format!("can't open workload file {}", workload_path.display()))?;
    let workload: Workload = serde_yaml::from_reader(f)
        .with_context(|| format!("can't parse workload file {}", workload_path.display()))?;

    let expander = match values {
        Some(values) => ValuesExpander::from_yaml_file(values)?,
        None => ValuesExpander::new(serde_yaml::Value::Null),
    };
    let expander: Option<&dyn Expander> = if no_expand { None } else { Some(&expander) };

    let base_path = workload_path
        .to_str()
        .ok_or_else(|| format_err!("workload path {:?} is not UTF-8", workload_path))?;
    let converter = ContainerFileConverter::new(&LocalFs, &MagicSecretCodec);
    let converted = convert_workload_files(&workload, Some(base_path), expander, &converter)
        .with_context(|| format!("can't convert files in {}", workload_path.display()))?;
    info!(
        "generated {} ConfigMaps for {} containers",
        converted.config_maps.len(),
        converted.containers.len(),
    );

    let mut manifest = render_manifests(&converted.config_maps)?;
    manifest.push_str(&render_manifests(&converted.containers)?);
    print!("{}", manifest);
    Ok(())
}
