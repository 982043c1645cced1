use std::io::Write;

use clap::{Parser, Subcommand};
use netcom_client::network::NetworkFilter;
use netcom_client::shell::AssociationString;
use netcom_client::{
    ComError, ConnectionSummary, HostStatus, NetworkProvider, NetworkSummary, friendly_com_hint,
};

/// Inspect Windows networks, connections and file associations.
#[derive(Debug, Parser)]
#[command(name = "netcom", version)]
pub struct Cli {
    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// List networks (connected ones unless told otherwise).
    Networks {
        /// Include disconnected networks.
        #[arg(long, conflicts_with = "disconnected")]
        all: bool,
        /// Only disconnected networks.
        #[arg(long)]
        disconnected: bool,
    },
    /// List active connections.
    Connections,
    /// Show machine-wide connectivity.
    Status,
    /// Look up an association string for an extension, ProgID or executable.
    Assoc {
        /// For example `.txt`, `txtfile` or `notepad.exe`.
        association: String,
        /// Which string to read (`executable`, `command`, `friendly-app-name`, ...).
        #[arg(long, default_value = "executable")]
        kind: AssociationString,
    },
}

impl Command {
    fn filter(&self) -> NetworkFilter {
        match self {
            Self::Networks { all: true, .. } => NetworkFilter::All,
            Self::Networks {
                disconnected: true, ..
            } => NetworkFilter::Disconnected,
            _ => NetworkFilter::Connected,
        }
    }
}

/// Runs one command against `provider`, writing its report to `out`.
pub async fn run(
    command: &Command,
    provider: &dyn NetworkProvider,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Command::Networks { .. } => {
            let networks = provider.list_networks(command.filter()).await?;
            write_networks(out, &networks)?;
        }
        Command::Connections => {
            let connections = provider.list_connections().await?;
            write_connections(out, &connections)?;
        }
        Command::Status => {
            let status = provider.host_status().await?;
            write_status(out, &status)?;
        }
        Command::Assoc { association, kind } => {
            let value = provider.query_association(association, *kind).await?;
            writeln!(out, "{value}")?;
        }
    }
    Ok(())
}

/// Formats an error chain, appending the friendly HRESULT hint when one exists.
pub fn report(error: &anyhow::Error) -> String {
    let hint = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<ComError>())
        .and_then(friendly_com_hint);
    match hint {
        Some(hint) => format!("Error: {error:#}\nHint: {hint}"),
        None => format!("Error: {error:#}"),
    }
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn write_networks(out: &mut impl Write, networks: &[NetworkSummary]) -> std::io::Result<()> {
    if networks.is_empty() {
        return writeln!(out, "No networks found.");
    }
    let rows = networks
        .iter()
        .map(|n| {
            vec![
                n.name.clone(),
                n.category.to_string(),
                n.connectivity.to_string(),
                yes_no(n.is_connected).to_string(),
                n.connection_count.to_string(),
                n.connected
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".into()),
                n.id.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    write_table(
        out,
        &["NAME", "CATEGORY", "CONNECTIVITY", "CONNECTED", "LINKS", "LAST CONNECTED", "ID"],
        &rows,
    )
}

fn write_connections(out: &mut impl Write, connections: &[ConnectionSummary]) -> std::io::Result<()> {
    if connections.is_empty() {
        return writeln!(out, "No active connections.");
    }
    let rows = connections
        .iter()
        .map(|c| {
            vec![
                c.network_name.clone(),
                c.connectivity.to_string(),
                c.domain_type.to_string(),
                c.adapter_id.to_string(),
                c.id.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    write_table(out, &["NETWORK", "CONNECTIVITY", "DOMAIN", "ADAPTER", "ID"], &rows)
}

fn write_status(out: &mut impl Write, status: &HostStatus) -> std::io::Result<()> {
    writeln!(out, "Connected:    {}", yes_no(status.is_connected))?;
    writeln!(out, "Internet:     {}", yes_no(status.is_connected_to_internet))?;
    writeln!(
        out,
        "Connectivity: {} (0x{:04X})",
        status.connectivity,
        status.connectivity.bits()
    )
}

fn table_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// Left-aligned columns separated by two spaces.
fn write_table(out: &mut impl Write, headers: &[&str], rows: &[Vec<String>]) -> std::io::Result<()> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    writeln!(out, "{}", table_line(headers.iter().copied(), &widths))?;
    for row in rows {
        writeln!(out, "{}", table_line(row.iter().map(String::as_str), &widths))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::*;
    use netcom_client::MockNetworkProvider;
    use netcom_client::network::{Connectivity, DomainType, NetworkCategory};
    use uuid::Uuid;

    fn summary(name: &str, id: u128) -> NetworkSummary {
        NetworkSummary {
            id: Uuid::from_u128(id),
            name: name.into(),
            description: String::new(),
            category: NetworkCategory::Private,
            domain_type: DomainType::NonDomain,
            connectivity: Connectivity::IPV4_INTERNET,
            is_connected: true,
            is_connected_to_internet: true,
            created: None,
            connected: None,
            connection_count: 1,
        }
    }

    async fn output(command: Command, mock: MockNetworkProvider) -> anyhow::Result<String> {
        let mut out = Vec::new();
        run(&command, &mock, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_networks_table() {
        let mut mock = MockNetworkProvider::new();
        mock.expect_list_networks()
            .with(eq(NetworkFilter::Connected))
            .times(1)
            .returning(|_| Ok(vec![summary("Home", 1), summary("Coffee shop", 2)]));

        let text = output(
            Command::Networks {
                all: false,
                disconnected: false,
            },
            mock,
        )
        .await
        .unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAME         CATEGORY"), "{text}");
        assert!(lines[1].starts_with("Home         private   internet"), "{text}");
        assert!(lines[2].contains("00000000-0000-0000-0000-000000000002"));
    }

    #[tokio::test]
    async fn test_network_filters() {
        for (all, disconnected, filter) in [
            (true, false, NetworkFilter::All),
            (false, true, NetworkFilter::Disconnected),
        ] {
            let mut mock = MockNetworkProvider::new();
            mock.expect_list_networks()
                .with(eq(filter))
                .times(1)
                .returning(|_| Ok(vec![]));
            let text = output(Command::Networks { all, disconnected }, mock)
                .await
                .unwrap();
            assert_eq!(text, "No networks found.\n");
        }
    }

    #[tokio::test]
    async fn test_status() {
        let mut mock = MockNetworkProvider::new();
        mock.expect_host_status().times(1).returning(|| {
            Ok(HostStatus {
                is_connected: true,
                is_connected_to_internet: false,
                connectivity: Connectivity::IPV4_LOCAL_NETWORK,
            })
        });
        let text = output(Command::Status, mock).await.unwrap();
        assert!(text.contains("Internet:     no"));
        assert!(text.contains("local network (0x0020)"));
    }

    #[tokio::test]
    async fn test_connections() {
        let mut mock = MockNetworkProvider::new();
        mock.expect_list_connections().times(1).returning(|| {
            Ok(vec![ConnectionSummary {
                id: Uuid::from_u128(0x11),
                adapter_id: Uuid::from_u128(0xA1),
                network_id: Uuid::from_u128(1),
                network_name: "Home".into(),
                connectivity: Connectivity::IPV4_INTERNET,
                domain_type: DomainType::Domain,
                is_connected: true,
                is_connected_to_internet: true,
            }])
        });
        let text = output(Command::Connections, mock).await.unwrap();
        assert!(text.lines().nth(1).unwrap().starts_with("Home     internet"));
        assert!(text.contains("domain"));
    }

    #[tokio::test]
    async fn test_assoc() {
        let mut mock = MockNetworkProvider::new();
        mock.expect_query_association()
            .with(eq(".txt"), eq(AssociationString::ContentType))
            .times(1)
            .returning(|_, _| Ok("text/plain".into()));
        let text = output(
            Command::Assoc {
                association: ".txt".into(),
                kind: AssociationString::ContentType,
            },
            mock,
        )
        .await
        .unwrap();
        assert_eq!(text, "text/plain\n");
    }

    #[tokio::test]
    async fn test_error_report_includes_hint() {
        let mut mock = MockNetworkProvider::new();
        mock.expect_host_status().returning(|| {
            Err(anyhow::Error::new(ComError::Activation {
                status: netcom_client::com::abi::REGDB_E_CLASSNOTREG,
            })
            .context("Failed to read host connectivity"))
        });
        let err = output(Command::Status, mock).await.unwrap_err();
        let text = report(&err);
        assert!(text.starts_with("Error: Failed to read host connectivity: Activation failed"));
        assert!(text.ends_with("Hint: Class is not registered on this machine"), "{text}");
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["netcom", "-v", "networks", "--all"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.command.filter(), NetworkFilter::All);

        let cli = Cli::try_parse_from(["netcom", "assoc", ".md"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Assoc {
                association: ".md".into(),
                kind: AssociationString::Executable
            }
        );

        assert!(Cli::try_parse_from(["netcom", "networks", "--all", "--disconnected"]).is_err());
        assert!(Cli::try_parse_from(["netcom", "assoc", ".md", "--kind", "bogus"]).is_err());
    }
}
