//! Outbound line encoders.
//!
//! Every reply shape in the protocol has one builder here so callers never
//! format tokens by hand. Builders return the line without a terminator;
//! connection writers append the LF.

use crate::token;

/// `JOIN <port>`
pub fn join(port: u16) -> String {
    format!("{} {}", token::JOIN, port)
}

/// `STORE_TO <p1> <p2> ... <pR>`
pub fn store_to(ports: &[u16]) -> String {
    let mut line = String::from(token::STORE_TO);
    for port in ports {
        line.push(' ');
        line.push_str(&port.to_string());
    }
    line
}

/// `LOAD_FROM <port> <size>`
pub fn load_from(port: u16, size: u64) -> String {
    format!("{} {} {}", token::LOAD_FROM, port, size)
}

/// `LIST <name1> <name2> ...`; the bare token when the listing is empty.
pub fn list<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut line = String::from(token::LIST);
    for name in names {
        line.push(' ');
        line.push_str(name.as_ref());
    }
    line
}

/// `STORE_ACK <name>`
pub fn store_ack(name: &str) -> String {
    format!("{} {}", token::STORE_ACK, name)
}

/// `REMOVE <name>` - controller to store.
pub fn remove(name: &str) -> String {
    format!("{} {}", token::REMOVE, name)
}

/// `REMOVE_ACK <name>`
pub fn remove_ack(name: &str) -> String {
    format!("{} {}", token::REMOVE_ACK, name)
}

/// `ERROR_FILE_DOES_NOT_EXIST <name>` - store to controller, missing file
/// on remove.
pub fn file_missing(name: &str) -> String {
    format!("{} {}", token::ERROR_FILE_DOES_NOT_EXIST, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;

    #[test]
    fn store_to_lists_every_port() {
        assert_eq!(store_to(&[8001, 8002, 8003]), "STORE_TO 8001 8002 8003");
    }

    #[test]
    fn empty_list_is_the_bare_token() {
        assert_eq!(list(Vec::<&str>::new()), "LIST");
        assert_eq!(list(["a", "b"]), "LIST a b");
    }

    #[test]
    fn load_from_carries_port_and_size() {
        assert_eq!(load_from(8002, 1024), "LOAD_FROM 8002 1024");
    }

    #[test]
    fn encoded_lines_parse_back() {
        assert_eq!(
            Request::parse(&join(9001)).unwrap(),
            Request::Join { port: 9001 }
        );
        assert_eq!(
            Request::parse(&store_ack("f")).unwrap(),
            Request::StoreAck {
                name: "f".to_string()
            }
        );
        assert_eq!(
            Request::parse(&file_missing("f")).unwrap(),
            Request::RemoveMissing {
                name: "f".to_string()
            }
        );
    }
}
