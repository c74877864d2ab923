//! Parser for the SVG-style path mini-language used by path annotations.
//!
//! Freehand annotations carry their geometry as a path data string (the `d`
//! attribute grammar): single-letter commands followed by number lists, with
//! whitespace or commas as separators. The parser normalizes everything to
//! absolute coordinates so the drawing backend only sees five command shapes.
//!
//! Supported commands: `M/m`, `L/l`, `H/h`, `V/v`, `C/c`, `S/s`, `Q/q`, `T/t`,
//! `Z/z`, including implicit command repetition. Elliptical arcs (`A/a`) are
//! not supported and fail the parse, which rejects only that annotation.

use crate::geometry::Point;

/// One normalized path command, in absolute path-space coordinates
/// (y grows downward, matching the authoring viewport).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    /// Begin a new subpath at the given point.
    MoveTo(Point),
    /// Straight line from the current point.
    LineTo(Point),
    /// Cubic Bezier: two control points, then the end point.
    CurveTo(Point, Point, Point),
    /// Quadratic Bezier: one control point, then the end point.
    QuadTo(Point, Point),
    /// Close the current subpath.
    Close,
}

/// Reasons a path data string fails to parse.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PathDataError {
    /// The string contains no commands.
    #[error("path data is empty")]
    Empty,

    /// A command letter outside the supported set.
    #[error("unsupported path command '{0}'")]
    UnsupportedCommand(char),

    /// A coordinate was expected but not found.
    #[error("expected a number at byte {0}")]
    ExpectedNumber(usize),

    /// Path data must begin with a moveto.
    #[error("path data must start with a moveto command")]
    MissingMoveTo,
}

/// Parse path data into normalized absolute commands.
///
/// # Examples
///
/// ```
/// use pdf_overlay::path_data::{parse_path_data, PathCommand};
/// use pdf_overlay::geometry::Point;
///
/// let commands = parse_path_data("M 0 0 L 10 5 Z").unwrap();
/// assert_eq!(commands[1], PathCommand::LineTo(Point::new(10.0, 5.0)));
/// assert_eq!(commands[2], PathCommand::Close);
/// ```
pub fn parse_path_data(data: &str) -> Result<Vec<PathCommand>, PathDataError> {
    let mut parser = Parser::new(data);
    parser.run()?;
    if parser.commands.is_empty() {
        return Err(PathDataError::Empty);
    }
    Ok(parser.commands)
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    commands: Vec<PathCommand>,
    /// Current point after the last command.
    cur: Point,
    /// Start of the current subpath, for Z.
    subpath_start: Point,
    /// Second control point of the last cubic, for S reflection.
    last_cubic_ctrl: Option<Point>,
    /// Control point of the last quadratic, for T reflection.
    last_quad_ctrl: Option<Point>,
}

impl<'a> Parser<'a> {
    fn new(data: &'a str) -> Self {
        Self {
            bytes: data.as_bytes(),
            pos: 0,
            commands: Vec::new(),
            cur: Point::new(0.0, 0.0),
            subpath_start: Point::new(0.0, 0.0),
            last_cubic_ctrl: None,
            last_quad_ctrl: None,
        }
    }

    fn run(&mut self) -> Result<(), PathDataError> {
        let mut command: Option<u8> = None;

        loop {
            self.skip_separators();
            let Some(&byte) = self.bytes.get(self.pos) else {
                break;
            };

            if byte.is_ascii_alphabetic() {
                self.pos += 1;
                command = Some(byte);
            } else if let Some(prev) = command {
                // Bare numbers repeat the previous command; after a moveto the
                // implicit repetition is a lineto of matching relativity. Z
                // takes no numbers, so none may follow it.
                command = Some(match prev {
                    b'M' => b'L',
                    b'm' => b'l',
                    b'Z' | b'z' => return Err(PathDataError::UnsupportedCommand(byte as char)),
                    other => other,
                });
            } else {
                return Err(PathDataError::MissingMoveTo);
            }

            let cmd = command.unwrap();
            if self.commands.is_empty() && !matches!(cmd, b'M' | b'm') {
                return Err(PathDataError::MissingMoveTo);
            }
            self.apply_command(cmd)?;
        }

        Ok(())
    }

    fn apply_command(&mut self, cmd: u8) -> Result<(), PathDataError> {
        let relative = cmd.is_ascii_lowercase();
        match cmd.to_ascii_uppercase() {
            b'M' => {
                let p = self.read_point(relative)?;
                self.cur = p;
                self.subpath_start = p;
                self.commands.push(PathCommand::MoveTo(p));
                self.reset_ctrl();
            }
            b'L' => {
                let p = self.read_point(relative)?;
                self.cur = p;
                self.commands.push(PathCommand::LineTo(p));
                self.reset_ctrl();
            }
            b'H' => {
                let x = self.read_number()?;
                let p = Point::new(if relative { self.cur.x + x } else { x }, self.cur.y);
                self.cur = p;
                self.commands.push(PathCommand::LineTo(p));
                self.reset_ctrl();
            }
            b'V' => {
                let y = self.read_number()?;
                let p = Point::new(self.cur.x, if relative { self.cur.y + y } else { y });
                self.cur = p;
                self.commands.push(PathCommand::LineTo(p));
                self.reset_ctrl();
            }
            b'C' => {
                let c1 = self.read_point(relative)?;
                let c2 = self.read_point(relative)?;
                let p = self.read_point(relative)?;
                self.cur = p;
                self.commands.push(PathCommand::CurveTo(c1, c2, p));
                self.last_cubic_ctrl = Some(c2);
                self.last_quad_ctrl = None;
            }
            b'S' => {
                let c1 = self.reflect(self.last_cubic_ctrl);
                let c2 = self.read_point(relative)?;
                let p = self.read_point(relative)?;
                self.cur = p;
                self.commands.push(PathCommand::CurveTo(c1, c2, p));
                self.last_cubic_ctrl = Some(c2);
                self.last_quad_ctrl = None;
            }
            b'Q' => {
                let c = self.read_point(relative)?;
                let p = self.read_point(relative)?;
                self.cur = p;
                self.commands.push(PathCommand::QuadTo(c, p));
                self.last_quad_ctrl = Some(c);
                self.last_cubic_ctrl = None;
            }
            b'T' => {
                let c = self.reflect(self.last_quad_ctrl);
                let p = self.read_point(relative)?;
                self.cur = p;
                self.commands.push(PathCommand::QuadTo(c, p));
                self.last_quad_ctrl = Some(c);
                self.last_cubic_ctrl = None;
            }
            b'Z' => {
                self.cur = self.subpath_start;
                self.commands.push(PathCommand::Close);
                self.reset_ctrl();
            }
            other => return Err(PathDataError::UnsupportedCommand(other as char)),
        }
        Ok(())
    }

    /// Reflect the previous control point across the current point, or fall
    /// back to the current point when the previous command set none.
    fn reflect(&self, ctrl: Option<Point>) -> Point {
        match ctrl {
            Some(c) => Point::new(2.0 * self.cur.x - c.x, 2.0 * self.cur.y - c.y),
            None => self.cur,
        }
    }

    fn reset_ctrl(&mut self) {
        self.last_cubic_ctrl = None;
        self.last_quad_ctrl = None;
    }

    fn read_point(&mut self, relative: bool) -> Result<Point, PathDataError> {
        let x = self.read_number()?;
        let y = self.read_number()?;
        Ok(if relative {
            Point::new(self.cur.x + x, self.cur.y + y)
        } else {
            Point::new(x, y)
        })
    }

    fn read_number(&mut self) -> Result<f32, PathDataError> {
        self.skip_separators();
        let start = self.pos;
        let mut seen_digit = false;
        let mut seen_dot = false;
        let mut seen_exp = false;

        while let Some(&byte) = self.bytes.get(self.pos) {
            match byte {
                b'+' | b'-' => {
                    // A sign is only part of the number at its start or right
                    // after an exponent marker.
                    let after_exp = self.pos > start
                        && matches!(self.bytes[self.pos - 1], b'e' | b'E')
                        && seen_exp;
                    if self.pos != start && !after_exp {
                        break;
                    }
                }
                b'0'..=b'9' => seen_digit = true,
                b'.' => {
                    if seen_dot || seen_exp {
                        break;
                    }
                    seen_dot = true;
                }
                b'e' | b'E' => {
                    if seen_exp || !seen_digit {
                        break;
                    }
                    seen_exp = true;
                }
                _ => break,
            }
            self.pos += 1;
        }

        if !seen_digit {
            return Err(PathDataError::ExpectedNumber(start));
        }

        // The scanned slice is ASCII digits/sign/dot/exponent only.
        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()
            .and_then(|s| s.parse::<f32>().ok())
            .ok_or(PathDataError::ExpectedNumber(start))
    }

    fn skip_separators(&mut self) {
        while let Some(&byte) = self.bytes.get(self.pos) {
            if byte.is_ascii_whitespace() || byte == b',' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }
}
