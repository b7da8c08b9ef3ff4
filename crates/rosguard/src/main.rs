use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use rosguard::config;
use rosguard::{Outcome, RestClient, WireguardServer};
use rosguard_types::{Field, Interface, IpAddress, Peer};
use serde::Serialize;
use tracing::info;

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(distribute)]
    {
        fmt().json().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    #[cfg(not(distribute))]
    {
        fmt().pretty().with_env_filter(filter).with_writer(std::io::stderr).init();
    }
}

#[derive(Debug, Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(version = env!("GIT_VERSION"))]
#[command(about = "Manage Wireguard on a RouterOS device over its REST API")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "/etc/rosguard/rosguard.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Wireguard interfaces
    #[command(subcommand)]
    Interfaces(InterfaceCommand),
    /// Wireguard peers
    #[command(subcommand)]
    Peers(PeerCommand),
    /// IP addresses bound to Wireguard interfaces
    #[command(subcommand)]
    Addresses(AddressCommand),
    /// Generate a key pair with the router's generator
    Keygen,
    /// Remove interfaces left behind by an interrupted keygen
    Sweep,
}

#[derive(Debug, Subcommand)]
enum InterfaceCommand {
    List,
    Create {
        name: String,
        #[command(flatten)]
        attrs: InterfaceAttrs,
    },
    Update {
        name: String,
        #[command(flatten)]
        attrs: InterfaceAttrs,
    },
    /// Delete an interface with its addresses and peers
    Delete { name: String },
}

#[derive(Debug, ClapArgs)]
struct InterfaceAttrs {
    #[arg(long)]
    listen_port: Option<u16>,
    #[arg(long)]
    mtu: Option<u16>,
    #[arg(long)]
    private_key: Option<String>,
    #[arg(long)]
    disabled: Option<bool>,
    #[arg(long)]
    comment: Option<String>,
}

impl InterfaceAttrs {
    fn into_interface(self, name: String) -> Interface {
        Interface {
            listen_port: Field::from_option(self.listen_port),
            mtu: Field::from_option(self.mtu),
            private_key: Field::from_option(self.private_key),
            disabled: Field::from_option(self.disabled),
            comment: Field::from_option(self.comment),
            ..Interface::new(name)
        }
    }
}

#[derive(Debug, Subcommand)]
enum PeerCommand {
    List,
    /// Create a peer; a key pair is generated when --public-key is omitted
    Create {
        #[arg(long)]
        interface: String,
        #[arg(long)]
        public_key: Option<String>,
        #[command(flatten)]
        attrs: PeerAttrs,
    },
    Update {
        public_key: String,
        #[arg(long)]
        interface: Option<String>,
        #[command(flatten)]
        attrs: PeerAttrs,
    },
    Delete { public_key: String },
}

#[derive(Debug, ClapArgs)]
struct PeerAttrs {
    #[arg(long)]
    allowed_address: Option<String>,
    #[arg(long)]
    endpoint_address: Option<String>,
    #[arg(long)]
    endpoint_port: Option<u16>,
    #[arg(long)]
    preshared_key: Option<String>,
    #[arg(long)]
    persistent_keepalive: Option<String>,
    #[arg(long)]
    disabled: Option<bool>,
    #[arg(long)]
    comment: Option<String>,
}

impl PeerAttrs {
    fn into_peer(self, interface: Option<String>, public_key: Option<String>) -> Peer {
        Peer {
            interface: Field::from_option(interface),
            public_key: Field::from_option(public_key),
            allowed_address: Field::from_option(self.allowed_address),
            endpoint_address: Field::from_option(self.endpoint_address),
            endpoint_port: Field::from_option(self.endpoint_port),
            preshared_key: Field::from_option(self.preshared_key),
            persistent_keepalive: Field::from_option(self.persistent_keepalive),
            disabled: Field::from_option(self.disabled),
            comment: Field::from_option(self.comment),
            ..Peer::default()
        }
    }
}

#[derive(Debug, Subcommand)]
enum AddressCommand {
    List,
    Create {
        /// Address in CIDR notation, e.g. 10.0.0.1/24
        address: String,
        #[arg(long)]
        interface: String,
        #[arg(long)]
        comment: Option<String>,
    },
    Delete {
        address: String,
        #[arg(long)]
        interface: String,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_outcome(outcome: Outcome) -> Result<(), serde_json::Error> {
    print_json(&serde_json::json!({ "outcome": outcome }))
}

async fn run(
    server: &WireguardServer<RestClient>,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Interfaces(cmd) => match cmd {
            InterfaceCommand::List => print_json(&server.interfaces().await)?,
            InterfaceCommand::Create { name, attrs } => {
                let outcome = server.create_interface(&attrs.into_interface(name)).await?;
                print_outcome(outcome)?;
            }
            InterfaceCommand::Update { name, attrs } => {
                let outcome = server.update_interface(&attrs.into_interface(name)).await?;
                print_outcome(outcome)?;
            }
            InterfaceCommand::Delete { name } => {
                let outcome = server.delete_interface(&Interface::new(name)).await?;
                print_outcome(outcome)?;
            }
        },
        Command::Peers(cmd) => match cmd {
            PeerCommand::List => print_json(&server.peers().await)?,
            PeerCommand::Create {
                interface,
                public_key,
                attrs,
            } => {
                let peer = attrs.into_peer(Some(interface), public_key);
                print_json(&server.create_peer(&peer).await?)?;
            }
            PeerCommand::Update {
                public_key,
                interface,
                attrs,
            } => {
                let peer = attrs.into_peer(interface, Some(public_key));
                print_outcome(server.update_peer(&peer).await?)?;
            }
            PeerCommand::Delete { public_key } => {
                let cached = server.snapshot().await.peer_by_public_key(&public_key).cloned();
                let outcome = match cached {
                    Some(peer) => server.delete_peer(&peer).await?,
                    None => Outcome::NotFound,
                };
                print_outcome(outcome)?;
            }
        },
        Command::Addresses(cmd) => match cmd {
            AddressCommand::List => print_json(&server.addresses().await)?,
            AddressCommand::Create {
                address,
                interface,
                comment,
            } => {
                let addr = IpAddress {
                    comment: Field::from_option(comment),
                    ..IpAddress::new(address, interface)
                };
                print_outcome(server.create_address(&addr).await?)?;
            }
            AddressCommand::Delete { address, interface } => {
                let cached = server
                    .snapshot()
                    .await
                    .addresses_on(&interface)
                    .find(|a| a.address.as_deref() == Some(address.as_str()))
                    .cloned();
                let outcome = match cached {
                    Some(addr) => server.delete_address(&addr).await?,
                    None => Outcome::NotFound,
                };
                print_outcome(outcome)?;
            }
        },
        Command::Keygen => print_json(&server.generate_keys().await?)?,
        Command::Sweep => {
            let removed = server.sweep_keygen_leftovers().await?;
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();
    let args = Args::parse();

    let config = config::load(&args.config).await?;
    info!(
        config = %args.config.display(),
        host = %config.router.host,
        "starting rosguard"
    );

    let client = RestClient::new(&config.router)?;
    let server = WireguardServer::new(client);
    server.refresh_all().await?;

    run(&server, args.command).await
}
