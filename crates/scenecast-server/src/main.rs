use anyhow::Context;
use clap::{value_parser, Arg, ArgMatches, Command};
use scenecast_server::{transport, Server, ServerConfig};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let config_arg = Arg::new("config")
        .long("config")
        .short('c')
        .help("Path to a TOML config file");

    Command::new("scenecast")
        .version(scenecast_server::VERSION)
        .about("Live 3D scene and control panel server")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("serve")
                .about("Serve a demo scene to websocket viewers until Ctrl-C")
                .arg(config_arg.clone())
                .arg(Arg::new("host").long("host").help("Bind host (overrides config)"))
                .arg(
                    Arg::new("port")
                        .long("port")
                        .short('p')
                        .value_parser(value_parser!(u16))
                        .help("Bind port (overrides config)"),
                ),
        )
        .subcommand(
            Command::new("check-config")
                .about("Validate a config file and print the effective settings")
                .arg(config_arg),
        )
}

fn load_config(args: &ArgMatches) -> anyhow::Result<ServerConfig> {
    let mut config = match args.get_one::<String>("config") {
        Some(path) => ServerConfig::load(path).with_context(|| format!("loading {path}"))?,
        None => ServerConfig::default(),
    };
    if let Ok(Some(host)) = args.try_get_one::<String>("host") {
        config = config.with_host(host.clone());
    }
    if let Ok(Some(port)) = args.try_get_one::<u16>("port") {
        config = config.with_port(*port);
    }
    config.validate()?;
    Ok(config)
}

fn init_tracing(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_demo(server: &Server) -> anyhow::Result<()> {
    let scene = server.scene();
    scene.add_grid("/ground", 10.0, 10.0)?;
    scene.add_frame("/world", true)?;
    let ball = scene.add_icosphere("/world/ball", 0.3, [200, 60, 60])?;
    scene.add_transform_controls("/world/gizmo", 1.0)?;
    scene.add_label("/world/ball/label", "drag the gizmo")?;

    let gui = server.gui();
    let settings = gui.add_folder("Settings")?;
    let (visible, size) = {
        let _scope = gui.scope(&settings)?;
        (
            gui.add_checkbox("Show ball", true)?,
            gui.add_slider("Ball radius", 0.1, 1.0, 0.05, 0.3)?,
        )
    };
    let count = gui.add_number("Clicks", 0.0)?;
    let button = gui.add_button("Click me")?;

    {
        let ball = ball.clone();
        visible.on_update(move |event| {
            ball.set_visible(event.value.as_bool().unwrap_or(true))?;
            Ok(())
        })?;
    }
    size.on_update(move |event| {
        ball.set_property("radius", event.value.clone())?;
        Ok(())
    })?;
    button.on_click(move |_| {
        let clicks = count.value()?.as_f64().unwrap_or(0.0);
        count.set_value(clicks + 1.0)?;
        Ok(())
    })?;
    Ok(())
}

async fn serve(args: &ArgMatches) -> anyhow::Result<()> {
    let config = load_config(args)?;
    init_tracing(&config);
    let addr = config.bind_addr()?;

    let server = Server::new(config)?;
    build_demo(&server)?;

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C");
        }
    };
    transport::serve(server.clone(), addr, shutdown).await?;
    server.stop();
    Ok(())
}

fn check_config(args: &ArgMatches) -> anyhow::Result<()> {
    let config = load_config(args)?;
    print!("{}", config.to_toml_string()?);
    println!("# config ok, binding {}", config.bind_addr()?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("serve", args)) => serve(args).await,
        Some(("check-config", args)) => check_config(args),
        Some((other, _)) => anyhow::bail!("unknown subcommand: {other}"),
        None => anyhow::bail!("no subcommand given"),
    }
}
