// Scanner for the text the engine leaves uncompiled after the first command.
//
// Whitespace, statement separators and comments may trail a command; anything
// else is a second command.

#[derive(Clone, Copy)]
enum State {
    Normal,
    LineComment,
    BlockComment,
}

fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// Locate a further command in `tail`, returning the text from its first byte.
pub(crate) fn trailing_command(tail: &str) -> Option<&str> {
    let bytes = tail.as_bytes();
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => {
                if b.is_ascii_whitespace() || b == b';' {
                    idx += 1;
                } else if is_line_comment_start(bytes, idx) {
                    state = State::LineComment;
                    idx += 2;
                } else if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment;
                    idx += 2;
                } else {
                    return tail.get(idx..);
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
                idx += 1;
            }
            State::BlockComment => {
                if is_block_comment_end(bytes, idx) {
                    state = State::Normal;
                    idx += 2;
                } else {
                    idx += 1;
                }
            }
        }
    }

    None
}
