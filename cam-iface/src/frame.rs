use machine_vision_formats as formats;

use formats::{owned::OImage, ImageData, PixFmt, Stride};

/// Match all [RawFrame] variants and execute an expression.
///
/// `$self` is the [RawFrame] and `$x` is the identifier of the [OImage]
/// used in the `$block`.
macro_rules! match_all_raw_fmts {
    ($self:expr, $x:ident, $block:expr) => {
        match $self {
            RawFrame::Mono8($x) => $block,
            RawFrame::BayerRG8($x) => $block,
            RawFrame::BayerGR8($x) => $block,
            RawFrame::BayerGB8($x) => $block,
            RawFrame::BayerBG8($x) => $block,
            RawFrame::RGB8($x) => $block,
        }
    };
}

/// A frame as delivered by a device, with pixel format known only at
/// runtime.
///
/// The variants cover the formats a GigE camera delivers in raw capture
/// mode: 8-bit monochrome and the four 8-bit Bayer tile orders, plus RGB8
/// for devices which debayer on-camera.
#[derive(Clone)]
pub enum RawFrame {
    Mono8(OImage<formats::pixel_format::Mono8>),
    BayerRG8(OImage<formats::pixel_format::BayerRG8>),
    BayerGR8(OImage<formats::pixel_format::BayerGR8>),
    BayerGB8(OImage<formats::pixel_format::BayerGB8>),
    BayerBG8(OImage<formats::pixel_format::BayerBG8>),
    RGB8(OImage<formats::pixel_format::RGB8>),
}

fn _test_raw_frame_is_send() {
    // Compile-time test to ensure RawFrame implements Send trait.
    fn implements<T: Send>() {}
    implements::<RawFrame>();
}

impl std::fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        write!(f, "RawFrame{{{}, ..}}", self.pixel_format())
    }
}

impl RawFrame {
    /// Move raw data (without copy) into a new [RawFrame].
    ///
    /// Returns None when `pixfmt` is not a raw capture format or the
    /// buffer is too small for the given geometry.
    pub fn new(w: u32, h: u32, s: usize, buf: Vec<u8>, pixfmt: PixFmt) -> Option<RawFrame> {
        match pixfmt {
            PixFmt::Mono8 => OImage::new(w, h, s, buf).map(RawFrame::Mono8),
            PixFmt::BayerRG8 => OImage::new(w, h, s, buf).map(RawFrame::BayerRG8),
            PixFmt::BayerGR8 => OImage::new(w, h, s, buf).map(RawFrame::BayerGR8),
            PixFmt::BayerGB8 => OImage::new(w, h, s, buf).map(RawFrame::BayerGB8),
            PixFmt::BayerBG8 => OImage::new(w, h, s, buf).map(RawFrame::BayerBG8),
            PixFmt::RGB8 => OImage::new(w, h, s, buf).map(RawFrame::RGB8),
            _ => None,
        }
    }

    pub fn width(&self) -> u32 {
        match_all_raw_fmts!(self, x, { x.width() })
    }

    pub fn height(&self) -> u32 {
        match_all_raw_fmts!(self, x, { x.height() })
    }

    pub fn pixel_format(&self) -> PixFmt {
        use RawFrame::*;
        match self {
            Mono8(_) => PixFmt::Mono8,
            BayerRG8(_) => PixFmt::BayerRG8,
            BayerGR8(_) => PixFmt::BayerGR8,
            BayerGB8(_) => PixFmt::BayerGB8,
            BayerBG8(_) => PixFmt::BayerBG8,
            RGB8(_) => PixFmt::RGB8,
        }
    }

    /// Get a view of the image data.
    ///
    /// Note that this discards any type information about the pixel
    /// format.
    pub fn image_data_without_format(&self) -> &[u8] {
        match_all_raw_fmts!(self, x, &x.image_data())
    }

    /// Convert into the fixed three-channel interleaved output format.
    ///
    /// A frame already in RGB8 is passed through by moving the data;
    /// monochrome and Bayer data are expanded on the host.
    pub fn into_rgb8(
        self,
    ) -> Result<OImage<formats::pixel_format::RGB8>, convert_image::Error> {
        if self.pixel_format() == PixFmt::RGB8 {
            // Fast path. Simply return the data.
            let width = self.width();
            let height = self.height();
            let stride = self.stride();
            let image_data: Vec<u8> = self.into();
            Ok(OImage::new(width, height, stride, image_data).unwrap())
        } else {
            let width = self.width();
            let height = self.height();

            let dest_fmt =
                formats::pixel_format::pixfmt::<formats::pixel_format::RGB8>().unwrap();

            // Allocate buffer for the converted image.
            let dest_stride = dest_fmt.bits_per_pixel() as usize * width as usize / 8;
            let dest_size = height as usize * dest_stride;
            let mut dest_buf = vec![0u8; dest_size];

            {
                let mut dest = formats::image_ref::ImageRefMut::<formats::pixel_format::RGB8>::new(
                    width,
                    height,
                    dest_stride,
                    &mut dest_buf,
                )
                .unwrap();

                match_all_raw_fmts!(&self, x, convert_image::convert_into(x, &mut dest)?);
            }

            Ok(OImage::new(width, height, dest_stride, dest_buf).unwrap())
        }
    }
}

impl From<RawFrame> for Vec<u8> {
    fn from(orig: RawFrame) -> Self {
        match_all_raw_fmts!(orig, x, { x.into() })
    }
}

impl Stride for RawFrame {
    fn stride(&self) -> usize {
        match_all_raw_fmts!(self, x, { x.stride() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb8_passthrough_is_lossless() {
        let data = vec![10u8; 4 * 2 * 3];
        let im = OImage::<formats::pixel_format::RGB8>::new(4, 2, 12, data.clone()).unwrap();
        let converted = RawFrame::RGB8(im).into_rgb8().unwrap();
        assert_eq!(converted.image_data(), &data[..]);
        assert_eq!(converted.width(), 4);
        assert_eq!(converted.height(), 2);
    }

    #[test]
    fn mono8_converts_to_rgb8_dims() {
        let width = 16u32;
        let height = 8u32;
        let mut image_data = vec![0u8; (width * height) as usize];
        for (i, px) in image_data.iter_mut().enumerate() {
            *px = (i % 256) as u8;
        }
        let raw = RawFrame::new(width, height, width as usize, image_data, PixFmt::Mono8).unwrap();
        assert_eq!(raw.pixel_format(), PixFmt::Mono8);

        let converted = raw.into_rgb8().unwrap();
        assert_eq!(converted.width(), width);
        assert_eq!(converted.height(), height);
        // three interleaved channels per pixel
        assert_eq!(converted.stride(), width as usize * 3);
        assert_eq!(
            converted.image_data().len(),
            converted.stride() * height as usize
        );
    }

    #[test]
    fn bayer_converts_to_rgb8_dims() {
        let width = 32u32;
        let height = 16u32;
        let image_data = vec![128u8; (width * height) as usize];
        let raw =
            RawFrame::new(width, height, width as usize, image_data, PixFmt::BayerRG8).unwrap();
        let converted = raw.into_rgb8().unwrap();
        assert_eq!(converted.width(), width);
        assert_eq!(converted.height(), height);
        assert_eq!(converted.stride(), width as usize * 3);
    }

    #[test]
    fn non_raw_formats_are_rejected() {
        let image_data = vec![0u8; 16 * 8 * 2];
        assert!(RawFrame::new(16, 8, 32, image_data, PixFmt::YUV422).is_none());
    }

    #[test]
    fn undersized_buffer_is_rejected() {
        let image_data = vec![0u8; 4];
        assert!(RawFrame::new(16, 8, 16, image_data, PixFmt::Mono8).is_none());
    }
}
