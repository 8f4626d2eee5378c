use blockfs::io::BlockStorage;
use blockfs::BlockFs;

/// One parsed client command. A line is split on single spaces into at most
/// three tokens, so `WRITE` content is the remainder of the line after the
/// second space, embedded spaces included. Keywords are case-insensitive.
#[derive(Debug, PartialEq)]
pub enum Request {
    Create(String),
    Delete(String),
    Read(String),
    Write(String, String),
    List,
    Quit,
}

impl Request {
    /// Parses one command line. Errors are complete response lines; nothing
    /// here reaches the storage engine.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut parts = line.splitn(3, ' ');
        let keyword = parts.next().unwrap_or("").to_ascii_uppercase();
        // Doubled spaces produce empty tokens; treat those as missing.
        let mut arg = move || parts.next().filter(|part| !part.is_empty());

        match keyword.as_str() {
            "CREATE" => arg()
                .map(|name| Request::Create(name.to_string()))
                .ok_or_else(|| "ERROR: CREATE needs filename".to_string()),
            "DELETE" => arg()
                .map(|name| Request::Delete(name.to_string()))
                .ok_or_else(|| "ERROR: DELETE needs filename".to_string()),
            "READ" => arg()
                .map(|name| Request::Read(name.to_string()))
                .ok_or_else(|| "ERROR: READ needs filename".to_string()),
            "WRITE" => match (arg(), arg()) {
                (Some(name), Some(content)) => {
                    Ok(Request::Write(name.to_string(), content.to_string()))
                }
                _ => Err("ERROR: WRITE needs filename and content".to_string()),
            },
            "LIST" => Ok(Request::List),
            "QUIT" => Ok(Request::Quit),
            _ => Err("ERROR: Unknown command".to_string()),
        }
    }
}

/// A rendered response line, plus whether the session should close after
/// sending it.
#[derive(Debug, PartialEq)]
pub struct Response {
    pub text: String,
    pub disconnect: bool,
}

impl Response {
    fn reply(text: String) -> Self {
        Self {
            text,
            disconnect: false,
        }
    }
}

/// Maps one input line to one storage-engine invocation and renders the
/// response. Stateless per call; the engine owns all state.
pub fn process<T: BlockStorage>(fs: &mut BlockFs<T>, line: &str) -> Response {
    let request = match Request::parse(line) {
        Ok(request) => request,
        Err(text) => return Response::reply(text),
    };

    match request {
        Request::Create(name) => match fs.create_file(&name) {
            Ok(()) => Response::reply(format!("SUCCESS: File '{}' created", name)),
            Err(e) => Response::reply(format!("ERROR: {}", e)),
        },
        Request::Delete(name) => match fs.delete_file(&name) {
            Ok(()) => Response::reply(format!("SUCCESS: File '{}' deleted", name)),
            Err(e) => Response::reply(format!("ERROR: {}", e)),
        },
        Request::Read(name) => match fs.read_file(&name) {
            Ok(bytes) => Response::reply(format!(
                "SUCCESS: Content: {}",
                String::from_utf8_lossy(&bytes)
            )),
            Err(e) => Response::reply(format!("ERROR: {}", e)),
        },
        Request::Write(name, content) => match fs.write_file(&name, content.as_bytes()) {
            Ok(()) => Response::reply(format!("SUCCESS: Written to '{}'", name)),
            Err(e) => Response::reply(format!("ERROR: {}", e)),
        },
        Request::List => {
            let names = fs.list_files();
            if names.is_empty() {
                Response::reply("SUCCESS: No files".to_string())
            } else {
                Response::reply(format!("SUCCESS: Files: {}", names.join(", ")))
            }
        }
        Request::Quit => Response {
            text: "SUCCESS: Disconnecting.".to_string(),
            disconnect: true,
        },
    }
}
