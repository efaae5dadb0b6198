error_chain! {
    foreign_links {
        Fmt(::std::fmt::Error);
        Io(::std::io::Error);
        Json(::json::Error);
        Dds(::ddsfile::Error);
        Lz4(::lz4_flex::frame::Error);
        Png(::png::EncodingError);
        GliumVertexCreate(::glium::vertex::BufferCreationError);
        GliumIndexCreate(::glium::index::BufferCreationError);
        GliumTextureCreate(::glium::texture::TextureCreationError);
        GliumBufferCreate(::glium::buffer::BufferCreationError);
    }
}

macro_rules! check {
    ($b:expr) => {
        if !$b {
            use $crate::errors::Error;
            use $crate::errors::ErrorKind;
            Err(Error::from_kind(ErrorKind::Msg(format!(
                "expected: {}",
                stringify!($b)
            ))))
        } else {
            Ok(())
        }
    };
}
