//! OSC messages: encoders and the parsed [`MessageRef`] view.

use crate::validate::{is_valid_format, is_valid_path, is_valid_string};
use crate::{padded_len, Argument, Error, Reader, Result, TypeTag, Writer};

/// Encoded size of a message with the given path and arguments.
pub fn message_len(path: &str, args: &[Argument<'_>]) -> usize {
    padded_len(path.len())
        + padded_len(1 + args.len())
        + args.iter().map(Argument::encoded_len).sum::<usize>()
}

/// Encode a message into `buf`, deriving the format string from the arguments.
///
/// Returns the number of bytes written.
pub fn encode_message(buf: &mut [u8], path: &str, args: &[Argument<'_>]) -> Result<usize> {
    let mut w = Writer::new(buf);
    write_message(&mut w, path, args)?;
    Ok(w.position())
}

/// Encode a message with an explicit format string (leading `,` optional).
///
/// Every argument must carry the tag its format character names, and the format must
/// declare exactly as many arguments as are given.
pub fn encode_vararg(
    buf: &mut [u8],
    path: &str,
    format: &str,
    args: &[Argument<'_>],
) -> Result<usize> {
    let tags = format.strip_prefix(',').unwrap_or(format);
    if !is_valid_format(tags, false) {
        return Err(Error::InvalidFormat);
    }
    if tags.len() != args.len() {
        return Err(Error::ArgumentCount {
            expected: tags.len(),
            found: args.len(),
        });
    }
    for (index, (tag, arg)) in tags.bytes().zip(args).enumerate() {
        if arg.tag().as_byte() != tag {
            return Err(Error::FormatMismatch {
                index,
                expected: tag as char,
            });
        }
    }
    encode_message(buf, path, args)
}

/// Write path, format string and arguments at the writer's cursor.
///
/// Every check runs before the first byte is written, so a failed call leaves the
/// writer untouched.
pub fn write_message(w: &mut Writer<'_>, path: &str, args: &[Argument<'_>]) -> Result<()> {
    if !is_valid_path(path) {
        return Err(Error::InvalidPath);
    }
    if args
        .iter()
        .filter_map(Argument::as_str)
        .any(|s| !is_valid_string(s))
    {
        return Err(Error::InvalidString);
    }
    let needed = message_len(path, args);
    if needed > w.remaining() {
        return Err(Error::BufferOverflow {
            needed,
            available: w.remaining(),
        });
    }
    w.put_str(path)?;

    let format = w.reserve(padded_len(1 + args.len()))?;
    format.fill(0);
    format[0] = b',';
    for (slot, arg) in format[1..].iter_mut().zip(args) {
        *slot = arg.tag().as_byte();
    }

    args.iter().try_for_each(|arg| w.put_argument(arg))
}

/// Zero-copy view over a structurally valid OSC message.
#[derive(Clone, Copy, Debug)]
pub struct MessageRef<'a> {
    bytes: &'a [u8],
    path: &'a str,
    format: &'a str,
    args: &'a [u8],
}

impl<'a> MessageRef<'a> {
    /// Parse and fully validate `buf`. Every declared argument must decode and the
    /// arguments must consume the buffer exactly.
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        if buf.is_empty() {
            return Err(Error::Empty);
        }
        let mut r = Reader::new(buf);
        let path = r.get_str()?;
        if !is_valid_path(path) {
            return Err(Error::InvalidPath);
        }
        let format = r.get_str()?;
        let format = format.strip_prefix(',').ok_or(Error::InvalidFormat)?;
        let args_start = r.position();
        for byte in format.bytes() {
            let tag = TypeTag::from_byte(byte).ok_or(Error::UnknownTag(byte as char))?;
            r.get_argument(tag)?;
        }
        if !r.is_empty() {
            return Err(Error::TrailingBytes(r.remaining()));
        }
        Ok(Self {
            bytes: buf,
            path,
            format,
            args: &buf[args_start..],
        })
    }

    #[inline]
    pub fn path(&self) -> &'a str {
        self.path
    }

    /// Type tags without the leading comma.
    #[inline]
    pub fn format(&self) -> &'a str {
        self.format
    }

    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn arg_count(&self) -> usize {
        self.format.len()
    }

    pub fn arguments(&self) -> Arguments<'a> {
        Arguments {
            tags: self.format.as_bytes(),
            reader: Reader::new(self.args),
        }
    }

    pub fn arg(&self, index: usize) -> Option<Argument<'a>> {
        self.arguments().nth(index)
    }
}

/// Iterator over the arguments of a [`MessageRef`].
#[derive(Clone, Debug)]
pub struct Arguments<'a> {
    tags: &'a [u8],
    reader: Reader<'a>,
}

impl<'a> Iterator for Arguments<'a> {
    type Item = Argument<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (&first, rest) = self.tags.split_first()?;
        self.tags = rest;
        let tag = TypeTag::from_byte(first)?;
        self.reader.get_argument(tag).ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.tags.len()))
    }
}
