use std::net::{Ipv4Addr, SocketAddr};

use codec::{Name, Netid};
use service::LOCAL_INTERFACE;

use crate::{forwarding, node::NodeState, topology};

/// A parsed user command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join(Netid),
    DirectJoin(SocketAddr),
    Create(Name),
    Delete(Name),
    Retrieve(Name),
    ShowTopology,
    ShowNames,
    ShowInterest,
    Leave,
    Exit,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Exit,
}

/// Parse one input line. `Ok(None)` is an empty line, `Err` carries the
/// message to print at the prompt.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut tokens = line.split_whitespace();
    let Some(verb) = tokens.next() else {
        return Ok(None);
    };

    let verb = verb.to_ascii_lowercase();
    let command = match verb.as_str() {
        "join" | "j" => Command::Join(parse_netid(tokens.next())?),
        "djoin" | "dj" => {
            let ip = tokens
                .next()
                .ok_or("usage: djoin (dj) <ip> <port>")?
                .parse::<Ipv4Addr>()
                .map_err(|_| "djoin: bad IPv4 address".to_string())?;
            let port = tokens
                .next()
                .ok_or("usage: djoin (dj) <ip> <port>")?
                .parse::<u16>()
                .map_err(|_| "djoin: bad port".to_string())?;
            Command::DirectJoin(SocketAddr::from((ip, port)))
        }
        "create" | "c" => Command::Create(parse_name(tokens.next(), "create (c)")?),
        "delete" | "dl" => Command::Delete(parse_name(tokens.next(), "delete (dl)")?),
        "retrieve" | "r" => Command::Retrieve(parse_name(tokens.next(), "retrieve (r)")?),
        "show" | "s" => match tokens.next().map(|it| it.to_ascii_lowercase()).as_deref() {
            Some("topology") => Command::ShowTopology,
            Some("names") => Command::ShowNames,
            Some("interest") => Command::ShowInterest,
            _ => return Err("usage: show <topology|names|interest>".to_string()),
        },
        "st" => Command::ShowTopology,
        "sn" => Command::ShowNames,
        "si" => Command::ShowInterest,
        "leave" | "l" => Command::Leave,
        "exit" | "x" => Command::Exit,
        "help" | "h" => Command::Help,
        other => return Err(format!("unknown command: {}", other)),
    };

    // Arguments containing whitespace come through as extra tokens and are
    // rejected, never truncated.
    if tokens.next().is_some() {
        return Err(format!("{}: too many arguments", verb));
    }

    Ok(Some(command))
}

fn parse_netid(token: Option<&str>) -> Result<Netid, String> {
    let token = token.ok_or("usage: join (j) <net>")?;
    Netid::new(token).map_err(|_| "netid must be exactly three decimal digits".to_string())
}

fn parse_name(token: Option<&str>, usage: &str) -> Result<Name, String> {
    let token = token.ok_or(format!("usage: {} <name>", usage))?;
    Name::new(token)
        .map_err(|_| format!("object names are 1 to {} alphanumeric characters", Name::MAX_LEN))
}

/// Parse and run one input line against the node.
pub async fn dispatch(state: &mut NodeState, line: &str) -> Outcome {
    let command = match parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return Outcome::Continue,
        Err(message) => {
            println!("{}", message);
            return Outcome::Continue;
        }
    };

    match command {
        Command::Join(net) => topology::join(state, net).await,
        Command::DirectJoin(addr) => topology::direct_join(state, addr).await,
        Command::Create(name) => {
            if state.store.publish(name.clone()) {
                println!("created {}", name);
            } else {
                println!("{} already exists", name);
            }
        }
        Command::Delete(name) => {
            if state.store.unpublish(&name) {
                println!("deleted {}", name);
            } else {
                println!("{} does not exist", name);
            }
        }
        Command::Retrieve(name) => forwarding::retrieve(state, name).await,
        Command::ShowTopology => show_topology(state),
        Command::ShowNames => show_names(state),
        Command::ShowInterest => show_interest(state),
        Command::Leave => topology::leave(state).await,
        Command::Help => print!("{}", HELP),
        Command::Exit => return Outcome::Exit,
    }

    Outcome::Continue
}

fn show_topology(state: &NodeState) {
    println!("node:     {}", state.addr);

    match state.netid {
        Some(net) => println!("network:  {}", net),
        None => println!("network:  (none)"),
    }

    match state.external_addr() {
        Some(addr) => println!("external: {}", addr),
        None => println!("external: (none)"),
    }

    match state.safety {
        Some(addr) => println!("safety:   {}", addr),
        None => println!("safety:   (none)"),
    }

    let internals = state.neighbors.internals();
    if internals.is_empty() {
        println!("internal: (none)");
    } else {
        println!("internal:");
        for interface in internals {
            if let Some(addr) = state.neighbors.addr_of(interface) {
                println!("  [{}] {}", interface, addr);
            }
        }
    }
}

fn show_names(state: &NodeState) {
    let mut owned: Vec<_> = state.store.owned().collect();
    owned.sort();

    println!("owned objects:");
    if owned.is_empty() {
        println!("  (none)");
    }
    for name in owned {
        println!("  {}", name);
    }

    println!(
        "cached objects ({}/{}):",
        state.store.cache_len(),
        state.store.capacity(),
    );
    if state.store.cache_len() == 0 {
        println!("  (none)");
    }
    for name in state.store.cached() {
        println!("  {}", name);
    }
}

fn show_interest(state: &NodeState) {
    if state.pit.is_empty() {
        println!("no pending interests");
        return;
    }

    for (name, entry) in state.pit.iter() {
        let mut states: Vec<_> = entry.states().collect();
        states.sort_by_key(|(interface, _)| *interface);

        let states: Vec<String> = states
            .into_iter()
            .map(|(interface, state)| {
                let tag = match interface {
                    LOCAL_INTERFACE => "local".to_string(),
                    other => other.to_string(),
                };
                format!("{}={:?}", tag, state)
            })
            .collect();

        println!("{} ({}s): {}", name, entry.age().as_secs(), states.join(" "));
    }
}

static HELP: &str = "\
commands:
  join (j) <net>          enter the named network via the registry
  djoin (dj) <ip> <port>  join directly through a node (0.0.0.0 creates a new network)
  create (c) <name>       publish an object on this node
  delete (dl) <name>      withdraw a published object
  retrieve (r) <name>     fetch an object: local store, cache, then network
  show topology (st)      this node, external, safety and internal neighbors
  show names (sn)         owned and cached object names
  show interest (si)      pending interest table
  leave (l)               unregister and drop all peers
  exit (x)                clean exit
  help (h)                this text
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases() {
        assert_eq!(
            parse("j 100").unwrap(),
            Some(Command::Join(Netid::new("100").unwrap()))
        );
        assert_eq!(
            parse("dj 0.0.0.0 0").unwrap(),
            Some(Command::DirectJoin("0.0.0.0:0".parse().unwrap()))
        );
        assert_eq!(parse("ST").unwrap(), Some(Command::ShowTopology));
        assert_eq!(parse("show interest").unwrap(), Some(Command::ShowInterest));
        assert_eq!(parse("x").unwrap(), Some(Command::Exit));
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse("join 07").is_err());
        assert!(parse("join seven").is_err());
        assert!(parse("create with space").is_err());
        assert!(parse("create acentuação").is_err());
        assert!(parse("dj 127.0.0.1").is_err());
        assert!(parse("dj localhost 5000").is_err());
        assert!(parse("frobnicate").is_err());
        assert!(parse("leave now").is_err());
    }
}
