use crate::memory::{BufferHandle, MemoryManager};
use crate::{
    AllocatorKind, AlphaType, ColorSpace, Error, ImageBuffer, ImageInfo, InitializationOptions,
    PixelFormat, PixelTransformable, Position, Rect, Result, Size, YuvImageBuffer,
};

fn rgba(width: u32, height: u32) -> Result<ImageBuffer> {
    ImageBuffer::new(&InitializationOptions::new(
        Size::new(width, height),
        PixelFormat::Rgba8888,
    ))
}

#[test]
fn empty_geometry_is_abnormal() {
    let options = InitializationOptions::new(Size::new(0, 4), PixelFormat::Rgba8888);
    assert!(matches!(ImageBuffer::new(&options), Err(Error::DataAbnormal(_))));
}

#[test]
fn families_are_separate() -> Result<()> {
    let yuv = InitializationOptions::new(Size::new(4, 4), PixelFormat::Nv12);
    assert!(matches!(ImageBuffer::new(&yuv), Err(Error::DataUnsupported(_))));

    let rgb = InitializationOptions::new(Size::new(4, 4), PixelFormat::Rgba8888);
    assert!(matches!(YuvImageBuffer::new(&rgb), Err(Error::DataUnsupported(_))));

    let unknown = InitializationOptions::new(Size::new(4, 4), PixelFormat::Unknown);
    assert!(ImageBuffer::new(&unknown).is_err());
    Ok(())
}

#[test]
fn unique_ids_differ() -> Result<()> {
    let a = rgba(2, 2)?;
    let b = rgba(2, 2)?;
    assert_ne!(a.unique_id(), b.unique_id());
    Ok(())
}

#[test]
fn strides_follow_the_format() -> Result<()> {
    let image = rgba(5, 3)?;
    assert_eq!(image.row_data_size(), 20);
    assert_eq!(image.row_stride(), 20);
    assert_eq!(image.byte_count(), 60);

    let mask = ImageBuffer::new(&InitializationOptions {
        alpha_type: AlphaType::Premul,
        ..InitializationOptions::new(Size::new(5, 3), PixelFormat::Alpha8)
    })?;
    // Alpha masks round rows up to four bytes.
    assert_eq!(mask.row_data_size(), 8);
    Ok(())
}

#[test]
fn opaque_images_start_opaque() -> Result<()> {
    let image = ImageBuffer::new(&InitializationOptions {
        alpha_type: AlphaType::Opaque,
        ..InitializationOptions::new(Size::new(3, 2), PixelFormat::Bgra8888)
    })?;
    assert_eq!(image.get_argb32_color(2, 1), Some(0xff00_0000));
    Ok(())
}

#[test]
fn release_leaves_no_pixels() -> Result<()> {
    let mut image = rgba(4, 4)?;
    image.release();
    assert!(image.pixels().is_none());
    assert_eq!(image.row_stride(), 0);
    assert!(image.read_pixel(Position::new(0, 0)).is_err());
    Ok(())
}

#[test]
fn set_image_info_releases_unless_reused() -> Result<()> {
    let mut image = rgba(4, 4)?;
    let info = ImageInfo::new(Size::new(2, 8), PixelFormat::Rgba8888);

    image.set_image_info(info, true)?;
    assert!(image.pixels().is_some());
    assert_eq!(image.row_data_size(), 8);

    image.set_image_info(info, false)?;
    assert!(image.pixels().is_none());
    Ok(())
}

#[test]
fn failed_transform_keeps_the_image() -> Result<()> {
    let mut image = rgba(100, 100)?;
    image.write_pixel(Position::new(1, 1), 0x8040_2010)?;
    let before = image.handle().map(BufferHandle::as_ptr);

    // 300000 x 300000 pixels exceed the memory ceiling.
    assert!(matches!(image.scale(3000.0, 3000.0, None), Err(Error::TooLarge(_))));
    assert!(matches!(image.crop(Rect::new(90, 90, 20, 20)), Err(Error::InvalidParameter(_))));
    assert!(image.rotate(f32::NAN).is_err());

    assert_eq!(image.handle().map(BufferHandle::as_ptr), before);
    assert_eq!((image.width(), image.height()), (100, 100));
    assert_eq!(image.read_pixel(Position::new(1, 1))?, 0x8040_2010);
    assert!(!image.is_transformed());
    Ok(())
}

#[test]
fn transforms_mark_the_image() -> Result<()> {
    let mut image = rgba(4, 2)?;
    image.rotate(90.0)?;
    assert!(image.is_transformed());
    image.set_transformed(false);
    assert!(!image.is_transformed());
    Ok(())
}

#[test]
fn read_only_images_reject_transforms() -> Result<()> {
    let mut image = ImageBuffer::new(&InitializationOptions {
        editable: false,
        ..InitializationOptions::new(Size::new(4, 4), PixelFormat::Rgba8888)
    })?;

    assert!(matches!(image.rotate(90.0), Err(Error::NotAllowModify)));
    assert!(matches!(image.flip(true, false), Err(Error::NotAllowModify)));
    assert!(matches!(image.translate(1.0, 0.0), Err(Error::NotAllowModify)));
    assert!(matches!(image.apply_color_space(ColorSpace::DisplayP3), Err(Error::NotAllowModify)));
    assert_eq!(image.width(), 4);
    Ok(())
}

#[test]
fn from_parts_checks_the_memory() -> Result<()> {
    let info = ImageInfo::new(Size::new(4, 4), PixelFormat::Rgba8888);

    let small = BufferHandle::from_heap(vec![0; 32]);
    assert!(matches!(
        ImageBuffer::from_parts(info, small, true),
        Err(Error::InvalidParameter(_))
    ));

    let exact = MemoryManager::create(AllocatorKind::Heap, 64, "test", None)
        .ok_or(Error::AllocationFailed {
            allocator: AllocatorKind::Heap,
            size: 64,
        })?;
    let image = ImageBuffer::from_parts(info, exact, true)?;
    assert_eq!(image.allocator(), AllocatorKind::Heap);
    Ok(())
}

#[test]
fn clones_are_deep() -> Result<()> {
    let mut image = rgba(3, 3)?;
    image.fill(0xff11_2233)?;
    let copy = image.try_clone()?;
    assert!(copy.is_same_image(&image));

    image.write_pixel(Position::new(0, 0), 0)?;
    assert!(!copy.is_same_image(&image));
    assert_eq!(copy.read_pixel(Position::new(0, 0))?, 0xff11_2233);
    Ok(())
}

#[test]
fn shared_images_are_created_in_shared_memory() -> Result<()> {
    let image = ImageBuffer::new(&InitializationOptions {
        allocator: AllocatorKind::SharedMemory,
        ..InitializationOptions::new(Size::new(8, 8), PixelFormat::Rgba8888)
    })?;
    assert_eq!(image.allocator(), AllocatorKind::SharedMemory);
    assert!(image.handle().and_then(BufferHandle::shared_fd).is_some());
    Ok(())
}

#[test]
fn hardware_rows_are_padded() -> Result<()> {
    let mut image = ImageBuffer::new(&InitializationOptions {
        allocator: AllocatorKind::HardwareBuffer,
        ..InitializationOptions::new(Size::new(5, 3), PixelFormat::Rgba8888)
    })?;
    assert_eq!(image.row_data_size(), 20);
    assert_eq!(image.row_stride(), 64);

    let pixels: Vec<u8> = (0..60).collect();
    image.write_pixels(&pixels)?;
    let mut back = vec![0; 60];
    image.read_pixels(&mut back)?;
    assert_eq!(back, pixels);
    Ok(())
}
