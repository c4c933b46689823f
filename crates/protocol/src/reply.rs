use std::fmt;

use bytes::{BufMut, BytesMut};

/// Resposta do servidor, encodada como uma ou mais linhas terminadas em CRLF.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `+OK`
    Simple(String),
    /// `-ERR ...`
    Error(String),
    /// `:42`
    Integer(i64),
    /// `"value"`
    Value(String),
    /// `(nil)`
    Nil,
    /// Linha crua (PONG, eco do PING, `(empty)`).
    Line(String),
    /// Bloco de várias linhas (INFO, KEYS, HELP, DUMPALL).
    Lines(Vec<String>),
}

impl Reply {
    pub fn ok() -> Reply {
        Reply::Simple("OK".into())
    }

    /// Erro com o prefixo `ERR`.
    pub fn error(msg: impl fmt::Display) -> Reply {
        Reply::Error(format!("ERR {msg}"))
    }

    /// Encoda a resposta no buffer.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Reply::Simple(s) => {
                dst.put_u8(b'+');
                put_line(dst, s);
            }
            Reply::Error(msg) => {
                dst.put_u8(b'-');
                put_line(dst, msg);
            }
            Reply::Integer(n) => {
                dst.put_u8(b':');
                put_line(dst, &n.to_string());
            }
            Reply::Value(v) => {
                dst.put_u8(b'"');
                dst.put_slice(v.as_bytes());
                dst.put_u8(b'"');
                dst.put_slice(b"\r\n");
            }
            Reply::Nil => put_line(dst, "(nil)"),
            Reply::Line(s) => put_line(dst, s),
            Reply::Lines(lines) => {
                for line in lines {
                    put_line(dst, line);
                }
            }
        }
    }
}

fn put_line(dst: &mut BytesMut, line: &str) {
    dst.put_slice(line.as_bytes());
    dst.put_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(reply: &Reply) -> String {
        let mut buf = BytesMut::new();
        reply.encode(&mut buf);
        String::from_utf8(buf.to_vec()).unwrap()
    }

    #[test]
    fn encode_simple_and_error() {
        assert_eq!(encoded(&Reply::ok()), "+OK\r\n");
        assert_eq!(
            encoded(&Reply::error("unknown command 'FOO'")),
            "-ERR unknown command 'FOO'\r\n"
        );
    }

    #[test]
    fn encode_integer_value_nil() {
        assert_eq!(encoded(&Reply::Integer(-2)), ":-2\r\n");
        assert_eq!(encoded(&Reply::Value("a b".into())), "\"a b\"\r\n");
        assert_eq!(encoded(&Reply::Nil), "(nil)\r\n");
    }

    #[test]
    fn encode_lines() {
        let reply = Reply::Lines(vec!["SET a 1".into(), ".".into()]);
        assert_eq!(encoded(&reply), "SET a 1\r\n.\r\n");
        assert_eq!(encoded(&Reply::Lines(vec![])), "");
    }
}
