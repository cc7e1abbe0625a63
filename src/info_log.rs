/// Access to the diagnostic log a graphics implementation keeps per compiled shader.
pub trait InfoLogQuery {
    /// Identifier of a compiled shader.
    type ShaderId: Copy;

    /// Length of the shader's log in bytes, terminator included; 0 when there is none.
    fn info_log_length(&self, shader: Self::ShaderId) -> usize;

    /// Copies up to `buf.len()` bytes of the log into `buf` and returns the count written.
    fn read_info_log(&self, shader: Self::ShaderId, buf: &mut [u8]) -> usize;
}

/// Returns the diagnostic log of a compiled shader as readable text.
///
/// An empty string means the implementation reported no log. Embedded NUL
/// bytes are removed.
pub fn shader_info_log<Q>(query: &Q, shader: Q::ShaderId) -> String
where
    Q: InfoLogQuery + ?Sized,
{
    let length = query.info_log_length(shader);
    if length == 0 {
        return String::new();
    }

    let mut buf = vec![0u8; length + 1];
    let written = query.read_info_log(shader, &mut buf).min(buf.len());
    buf.truncate(written);
    buf.retain(|&b| b != 0);

    String::from_utf8_lossy(&buf).into_owned()
}
