use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pixmap::{
    AllocatorKind, AlphaType, BufferHandle, CustomMemory, Error, ImageBuffer, ImageInfo,
    InitializationOptions, PixelFormat, PixelTransformable, Position, Rect, ScaleMode, Size,
    YuvImageBuffer,
};

/// Custom memory that counts how many of its allocations are still alive.
#[derive(Clone, Default)]
struct Tracked {
    outstanding: Arc<AtomicUsize>,
}

impl Tracked {
    fn allocate(&self, len: usize) -> BufferHandle {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let outstanding = self.outstanding.clone();
        BufferHandle::from_custom(CustomMemory::new(vec![0; len], move |_| {
            outstanding.fetch_sub(1, Ordering::SeqCst);
        }))
    }

    fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

fn options(width: u32, height: u32, format: PixelFormat) -> InitializationOptions {
    InitializationOptions::new(Size::new(width, height), format)
}

#[test]
fn replaced_memory_is_released_once() {
    let tracked = Tracked::default();
    let info = ImageInfo::new(Size::new(4, 4), PixelFormat::Rgba8888);

    let mut image = ImageBuffer::from_parts(info, tracked.allocate(64), true).unwrap();
    assert_eq!(image.allocator(), AllocatorKind::Custom);
    assert_eq!(tracked.outstanding(), 1);

    image.set_pixels(Some(tracked.allocate(64)));
    assert_eq!(tracked.outstanding(), 1);

    image.set_pixels(None);
    assert_eq!(tracked.outstanding(), 0);
    assert!(image.pixels().is_none());
    assert_eq!((image.row_data_size(), image.row_stride()), (0, 0));
    assert_eq!(image.byte_count(), 0);

    image.set_pixels(Some(tracked.allocate(64)));
    assert_eq!((image.row_data_size(), image.row_stride()), (16, 16));
    assert_eq!(image.read_pixel(Position::new(3, 3)).unwrap(), 0);
    drop(image);
    assert_eq!(tracked.outstanding(), 0);
}

#[test]
fn transforms_move_custom_memory_to_the_heap() {
    let tracked = Tracked::default();
    let info = ImageInfo::new(Size::new(4, 2), PixelFormat::Rgba8888);
    let mut image = ImageBuffer::from_parts(info, tracked.allocate(32), true).unwrap();

    image.rotate(90.0).unwrap();
    assert_eq!(image.allocator(), AllocatorKind::Heap);
    assert_eq!(tracked.outstanding(), 0);

    let copy = image.try_clone().unwrap();
    assert_eq!(copy.allocator(), AllocatorKind::Heap);
}

#[test]
fn clones_of_custom_images_are_on_the_heap() {
    let tracked = Tracked::default();
    let info = ImageInfo::new(Size::new(2, 2), PixelFormat::Rgba8888);
    let image = ImageBuffer::from_parts(info, tracked.allocate(16), true).unwrap();

    let copy = image.try_clone().unwrap();
    assert_eq!(copy.allocator(), AllocatorKind::Heap);
    assert_eq!(tracked.outstanding(), 1);
    drop(image);
    assert_eq!(tracked.outstanding(), 0);
    assert!(copy.pixels().is_some());
}

#[test]
fn read_only_images_keep_their_pixels() {
    let mut image = ImageBuffer::new(&options(4, 4, PixelFormat::Rgba8888)).unwrap();
    let canary: Vec<u8> = (0..64).collect();
    image.write_pixels(&canary).unwrap();
    image.set_editable(false);

    let zeros = vec![0; 64];
    assert!(matches!(image.write_pixels(&zeros), Err(Error::NotAllowModify)));
    assert!(matches!(
        image.write_pixel(Position::new(0, 0), 0),
        Err(Error::NotAllowModify)
    ));
    assert!(matches!(image.fill(0), Err(Error::NotAllowModify)));
    assert!(matches!(image.set_alpha(0.5), Err(Error::NotAllowModify)));
    assert!(matches!(image.pixels_mut(), Err(Error::NotAllowModify)));

    // Parameters are checked before the editable flag.
    assert!(matches!(
        image.write_pixels_region(&zeros, 0, 16, Rect::new(0, 0, 5, 1)),
        Err(Error::InvalidParameter(_))
    ));

    assert_eq!(image.pixels().unwrap(), &canary[..]);
}

#[test]
fn heap_ceiling() {
    let huge = options(100_000, 100_000, PixelFormat::Rgba8888);
    assert!(matches!(ImageBuffer::new(&huge), Err(Error::TooLarge(_))));

    let shared = InitializationOptions {
        allocator: AllocatorKind::SharedMemory,
        ..huge
    };
    assert!(matches!(ImageBuffer::new(&shared), Err(Error::TooLarge(_))));
}

#[test]
fn full_crop_keeps_the_memory() {
    let mut image = ImageBuffer::new(&options(6, 4, PixelFormat::Bgra8888)).unwrap();
    let before = image.handle().map(BufferHandle::as_ptr);

    image.crop(Rect::new(0, 0, 6, 4)).unwrap();
    assert_eq!(image.handle().map(BufferHandle::as_ptr), before);
    assert!(!image.is_transformed());
}

#[test]
fn pixels_are_bgra_words() {
    let mut image = ImageBuffer::new(&options(3, 2, PixelFormat::Rgba8888)).unwrap();
    image.write_pixel(Position::new(2, 1), 0xff11_2233).unwrap();

    assert_eq!(image.read_pixel(Position::new(2, 1)).unwrap(), 0xff11_2233);
    assert_eq!(image.get_argb32_color(2, 1), Some(0xff11_2233));
    // Stored in the byte order of the format.
    assert_eq!(image.get_pixel(2, 1), Some(&[0x11, 0x22, 0x33, 0xff][..]));

    assert!(matches!(
        image.read_pixel(Position::new(3, 0)),
        Err(Error::InvalidParameter(_))
    ));
    assert!(matches!(
        image.write_pixel(Position::new(0, -1), 0),
        Err(Error::InvalidParameter(_))
    ));
    assert_eq!(image.get_pixel32(5, 5), None);
}

#[test]
fn fill_converts_once() {
    let mut image = ImageBuffer::new(&InitializationOptions {
        alpha_type: AlphaType::Opaque,
        ..options(4, 3, PixelFormat::Rgb565)
    })
    .unwrap();
    image.fill(0xffff_0000).unwrap();

    for (x, y) in [(0, 0), (3, 2), (1, 2)] {
        assert_eq!(image.get_pixel16(x, y), Some(0xf800));
        assert_eq!(image.get_argb32_color(x, y), Some(0xffff_0000));
    }
}

#[test]
fn colors_are_read_with_offset_and_stride() {
    let colors = [
        0, 0xff00_0001, 0xff00_0002, 0, //
        0xff00_0003, 0xff00_0004, 0,
    ];
    let image = ImageBuffer::from_colors(&colors, 1, 3, &options(2, 2, PixelFormat::Rgba8888))
        .unwrap();

    assert_eq!(image.get_argb32_color(0, 0), Some(0xff00_0001));
    assert_eq!(image.get_argb32_color(1, 0), Some(0xff00_0002));
    assert_eq!(image.get_argb32_color(0, 1), Some(0xff00_0003));
    assert_eq!(image.get_argb32_color(1, 1), Some(0xff00_0004));

    let short = ImageBuffer::from_colors(&colors[..5], 1, 3, &options(2, 2, PixelFormat::Rgba8888));
    assert!(matches!(short, Err(Error::InvalidParameter(_))));

    let narrow = ImageBuffer::from_colors(&colors, 0, 1, &options(2, 2, PixelFormat::Rgba8888));
    assert!(matches!(narrow, Err(Error::InvalidParameter(_))));
}

#[test]
fn sources_are_cropped_and_converted() {
    let mut source = ImageBuffer::new(&options(4, 4, PixelFormat::Rgba8888)).unwrap();
    source.write_pixel(Position::new(2, 1), 0xff12_3456).unwrap();

    let copy = ImageBuffer::from_source(
        &source,
        Rect::new(1, 1, 2, 2),
        &options(0, 0, PixelFormat::Bgra8888),
    )
    .unwrap();
    assert_eq!((copy.width(), copy.height()), (2, 2));
    assert_eq!(copy.pixel_format(), PixelFormat::Bgra8888);
    assert_eq!(copy.get_argb32_color(1, 0), Some(0xff12_3456));
    assert_eq!(copy.get_pixel(1, 0), Some(&[0x56, 0x34, 0x12, 0xff][..]));

    let outside = ImageBuffer::from_source(&source, Rect::new(3, 3, 2, 2), &options(0, 0, PixelFormat::Unknown));
    assert!(matches!(outside, Err(Error::InvalidParameter(_))));
}

#[test]
fn sources_are_fitted_to_the_target_size() {
    let mut source = ImageBuffer::new(&options(6, 2, PixelFormat::Bgra8888)).unwrap();
    for x in 0..6 {
        let color = [0xff00_00ff, 0xff00_ff00, 0xffff_0000][x as usize / 2];
        for y in 0..2 {
            source.write_pixel(Position::new(x, y), color).unwrap();
        }
    }

    // Stretched, a uniform rectangle stays uniform.
    let stretched = ImageBuffer::from_source(
        &source,
        Rect::new(2, 0, 2, 2),
        &InitializationOptions {
            editable: false,
            ..options(5, 3, PixelFormat::Rgba8888)
        },
    )
    .unwrap();
    assert_eq!((stretched.width(), stretched.height()), (5, 3));
    assert_eq!(stretched.pixel_format(), PixelFormat::Rgba8888);
    assert_eq!(stretched.get_argb32_color(0, 0), Some(0xff00_ff00));
    assert_eq!(stretched.get_argb32_color(4, 2), Some(0xff00_ff00));
    assert!(!stretched.is_editable());
    assert!(!stretched.is_transformed());

    // Covering 2x2 needs no scaling, only the middle third is kept.
    let centered = ImageBuffer::from_source(
        &source,
        Rect::new(0, 0, 6, 2),
        &InitializationOptions {
            scale_mode: ScaleMode::CenterCrop,
            ..options(2, 2, PixelFormat::Bgra8888)
        },
    )
    .unwrap();
    assert_eq!((centered.width(), centered.height()), (2, 2));
    for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
        assert_eq!(centered.read_pixel(Position::new(x, y)).unwrap(), 0xff00_ff00);
    }

    // Covering 12x12 scales both axes by six before cropping.
    let enlarged = ImageBuffer::from_source(
        &source,
        Rect::new(0, 0, 6, 2),
        &InitializationOptions {
            scale_mode: ScaleMode::CenterCrop,
            ..options(12, 12, PixelFormat::Bgra8888)
        },
    )
    .unwrap();
    assert_eq!((enlarged.width(), enlarged.height()), (12, 12));
    assert_eq!(enlarged.read_pixel(Position::new(6, 6)).unwrap(), 0xff00_ff00);
}

#[test]
fn alpha_is_scaled() {
    let mut image = ImageBuffer::new(&InitializationOptions {
        alpha_type: AlphaType::Unpremul,
        ..options(2, 2, PixelFormat::Rgba8888)
    })
    .unwrap();
    image.fill(0xff64_3200).unwrap();
    image.set_alpha(0.5).unwrap();
    assert_eq!(image.read_pixel(Position::new(1, 1)).unwrap(), 0x8064_3200);

    let mut premul = ImageBuffer::new(&options(2, 2, PixelFormat::Rgba8888)).unwrap();
    premul.fill(0xc864_3200).unwrap();
    premul.set_alpha(0.5).unwrap();
    assert_eq!(premul.read_pixel(Position::new(0, 0)).unwrap(), 0x8040_2000);

    assert!(matches!(premul.set_alpha(0.0), Err(Error::InvalidParameter(_))));
    assert!(matches!(premul.set_alpha(1.5), Err(Error::InvalidParameter(_))));

    let mut opaque = ImageBuffer::new(&InitializationOptions {
        alpha_type: AlphaType::Opaque,
        ..options(2, 2, PixelFormat::Rgba8888)
    })
    .unwrap();
    assert!(matches!(opaque.set_alpha(0.5), Err(Error::DataUnsupported(_))));
}

#[test]
fn alpha_types_follow_the_format() {
    let mut rgb = ImageBuffer::new(&options(2, 2, PixelFormat::Rgb888)).unwrap();
    rgb.set_alpha_type(AlphaType::Premul).unwrap();
    assert_eq!(rgb.alpha_type(), AlphaType::Opaque);

    let mut mask = ImageBuffer::new(&options(2, 2, PixelFormat::Alpha8)).unwrap();
    assert!(mask.set_alpha_type(AlphaType::Opaque).is_err());
    assert!(mask.set_alpha_type(AlphaType::Unknown).is_err());
    mask.set_alpha_type(AlphaType::Unpremul).unwrap();
    assert_eq!(mask.alpha_type(), AlphaType::Unpremul);
}

#[test]
fn windowed_pixel_io() {
    let mut image = ImageBuffer::new(&options(4, 3, PixelFormat::Rgba8888)).unwrap();

    // Two rows of two pixels, eight bytes of padding after each row.
    let mut window = vec![0u8; 4 + 2 * 16];
    for (i, byte) in window[4..].iter_mut().enumerate() {
        *byte = i as u8 | 0x80;
    }
    image
        .write_pixels_region(&window, 4, 16, Rect::new(1, 1, 2, 2))
        .unwrap();

    assert_eq!(image.read_pixel(Position::new(0, 0)).unwrap(), 0);
    assert_eq!(
        image.read_pixel(Position::new(1, 1)).unwrap(),
        u32::from_le_bytes([0x80, 0x81, 0x82, 0x83])
    );
    assert_eq!(
        image.read_pixel(Position::new(2, 2)).unwrap(),
        u32::from_le_bytes([0x94, 0x95, 0x96, 0x97])
    );

    let mut back = vec![0u8; 4 + 2 * 16];
    image
        .read_pixels_region(&mut back, 4, 16, Rect::new(1, 1, 2, 2))
        .unwrap();
    for row in 0..2 {
        let at = 4 + row * 16;
        assert_eq!(back[at..at + 8], window[at..at + 8]);
    }

    let mut small = vec![0u8; 16];
    for (offset, stride, region) in [
        (0, 16, Rect::new(1, 1, 2, 2)),
        (0, 4, Rect::new(0, 0, 2, 1)),
        (0, 16, Rect::new(-1, 0, 1, 1)),
        (0, 16, Rect::new(0, 0, 0, 1)),
        (0, 16, Rect::new(3, 0, 2, 1)),
    ] {
        assert!(matches!(
            image.read_pixels_region(&mut small, offset, stride, region),
            Err(Error::InvalidParameter(_))
        ));
    }
}

#[test]
fn huge_offsets_are_rejected() {
    let mut image = ImageBuffer::new(&options(4, 3, PixelFormat::Rgba8888)).unwrap();
    let yuv = YuvImageBuffer::new(&options(4, 4, PixelFormat::Nv12)).unwrap();
    let mut window = vec![0u8; 64];

    for offset in [usize::MAX, usize::MAX - 3, usize::MAX - 16, usize::MAX / 2] {
        let region = Rect::new(0, 0, 2, 2);
        assert!(matches!(
            image.read_pixels_region(&mut window, offset, 16, region),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            image.write_pixels_region(&window, offset, 16, region),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            yuv.read_pixels_region(&mut window, offset, 16, region),
            Err(Error::InvalidParameter(_))
        ));
    }
    assert!(image.pixels().unwrap().iter().all(|&b| b == 0));
}

#[test]
fn tight_pixels_skip_padding() {
    let mut image = ImageBuffer::new(&InitializationOptions {
        allocator: AllocatorKind::HardwareBuffer,
        ..options(3, 2, PixelFormat::Bgra8888)
    })
    .unwrap();
    assert!(image.row_stride() > image.row_data_size());

    let pixels: Vec<u8> = (1..=24).collect();
    image.write_pixels(&pixels).unwrap();
    assert_eq!(image.get_pixel(0, 1), Some(&[13, 14, 15, 16][..]));

    let mut short = vec![0; 23];
    assert!(matches!(image.read_pixels(&mut short), Err(Error::InvalidParameter(_))));
}
