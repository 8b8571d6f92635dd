use std::{io, path::Path};
use tokio::{fs::File, io::AsyncReadExt};

const BUFFER_SIZE: usize = 4096;

/// MD5 of a file on disk as 32 lowercase hex characters.
pub async fn md5_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path).await?;
    let mut buffer = [0; BUFFER_SIZE];
    let mut ctx = md5::Context::new();
    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        ctx.consume(&buffer[..n]);
    }
    Ok(format!("{:x}", ctx.compute()))
}
