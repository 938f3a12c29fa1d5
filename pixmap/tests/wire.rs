use pixmap::{
    AllocatorKind, AlphaType, AnyImageBuffer, ColorSpace, Error, ImageBuffer,
    InitializationOptions, Parcel, PixelFormat, Position, Size, Tag, YuvColor, YuvImageBuffer,
    MIN_IMAGEDATA_SIZE,
};

fn options(width: u32, height: u32, format: PixelFormat) -> InitializationOptions {
    InitializationOptions {
        alpha_type: AlphaType::Unpremul,
        color_space: ColorSpace::DisplayP3,
        ..InitializationOptions::new(Size::new(width, height), format)
    }
}

fn patterned(options: &InitializationOptions) -> ImageBuffer {
    let mut image = ImageBuffer::new(options).unwrap();
    let len = image.byte_count() as usize;
    let pixels: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    image.write_pixels(&pixels).unwrap();
    image.set_base_density(160);
    image
}

fn round_trip(image: &ImageBuffer) -> ImageBuffer {
    let mut parcel = Parcel::new();
    image.marshal(&mut parcel).unwrap();
    AnyImageBuffer::unmarshal(&mut parcel)
        .unwrap()
        .into_rgb()
        .unwrap()
}

fn assert_same_description(a: &ImageBuffer, b: &ImageBuffer) {
    assert_eq!(a.info(), b.info());
    assert_eq!(a.is_editable(), b.is_editable());
    assert!(a.is_same_image(b));
}

#[test]
fn small_heap_images_are_inline() {
    let image = patterned(&options(8, 8, PixelFormat::Rgba8888));
    let mut parcel = Parcel::new();
    image.marshal(&mut parcel).unwrap();
    // Ten header words and the pixels.
    assert_eq!(parcel.data_size(), 10 * 4 + 256);

    let copy = AnyImageBuffer::unmarshal(&mut parcel).unwrap().into_rgb().unwrap();
    assert_same_description(&image, &copy);
    assert_eq!(copy.allocator(), AllocatorKind::Heap);
    assert_eq!(copy.base_density(), 160);
    assert_eq!(copy.color_space(), ColorSpace::DisplayP3);
}

#[test]
fn large_heap_images_travel_by_descriptor() {
    let image = patterned(&options(100, 100, PixelFormat::Bgra8888));
    assert!(image.byte_count() as usize > MIN_IMAGEDATA_SIZE);

    let mut parcel = Parcel::new();
    image.marshal(&mut parcel).unwrap();
    assert!(parcel.data_size() < MIN_IMAGEDATA_SIZE);

    let copy = AnyImageBuffer::unmarshal(&mut parcel).unwrap().into_rgb().unwrap();
    assert_same_description(&image, &copy);
    assert_eq!(copy.allocator(), AllocatorKind::Heap);
}

#[test]
fn read_only_flag_survives() {
    let mut image = patterned(&options(3, 3, PixelFormat::Rgb888));
    image.set_editable(false);
    let mut copy = round_trip(&image);
    assert!(!copy.is_editable());
    assert!(matches!(copy.fill(0), Err(Error::NotAllowModify)));
}

#[test]
fn shared_images_share_pages() {
    let image = patterned(&InitializationOptions {
        allocator: AllocatorKind::SharedMemory,
        ..options(16, 16, PixelFormat::Rgba8888)
    });

    let mut copy = round_trip(&image);
    assert_eq!(copy.allocator(), AllocatorKind::SharedMemory);
    assert_same_description(&image, &copy);

    copy.write_pixel(Position::new(3, 4), 0x1122_3344).unwrap();
    assert_eq!(image.read_pixel(Position::new(3, 4)).unwrap(), 0x1122_3344);

    drop(image);
    assert_eq!(copy.read_pixel(Position::new(3, 4)).unwrap(), 0x1122_3344);
}

#[test]
fn hardware_images_are_referenced() {
    let image = patterned(&InitializationOptions {
        allocator: AllocatorKind::HardwareBuffer,
        ..options(5, 3, PixelFormat::Rgba8888)
    });
    let ref_count = |image: &ImageBuffer| {
        image
            .handle()
            .and_then(|handle| handle.hardware_buffer())
            .map(|buffer| buffer.ref_count())
    };

    let mut copy = round_trip(&image);
    assert_eq!(copy.allocator(), AllocatorKind::HardwareBuffer);
    assert_eq!(ref_count(&image), Some(2));
    assert_eq!(ref_count(&copy), Some(2));
    assert_eq!(copy.row_stride(), image.row_stride());
    assert_same_description(&image, &copy);

    // Shared pixels are not writable while another owner exists.
    assert!(matches!(copy.fill(0), Err(Error::NotAllowModify)));

    drop(image);
    assert_eq!(ref_count(&copy), Some(1));
    copy.fill(0xff00_00ff).unwrap();
    assert_eq!(copy.read_pixel(Position::new(4, 2)).unwrap(), 0xff00_00ff);
}

#[test]
fn parcels_keep_hardware_buffers_alive() {
    let image = patterned(&InitializationOptions {
        allocator: AllocatorKind::HardwareBuffer,
        ..options(4, 4, PixelFormat::Rgba8888)
    });
    let pixels = image.pixels().unwrap().to_vec();

    let mut parcel = Parcel::new();
    image.marshal(&mut parcel).unwrap();
    drop(image);

    let mut copy = AnyImageBuffer::unmarshal(&mut parcel).unwrap().into_rgb().unwrap();
    let buffer = copy.handle().and_then(|handle| handle.hardware_buffer());
    assert_eq!(buffer.map(|buffer| buffer.ref_count()), Some(1));
    assert_eq!(copy.pixels().unwrap(), &pixels[..]);
    copy.fill(0).unwrap();
}

#[test]
fn hardware_pixels_are_frozen_while_in_flight() {
    let mut image = patterned(&InitializationOptions {
        allocator: AllocatorKind::HardwareBuffer,
        ..options(4, 4, PixelFormat::Rgba8888)
    });

    let mut parcel = Parcel::new();
    image.marshal(&mut parcel).unwrap();
    assert!(matches!(image.fill(0), Err(Error::NotAllowModify)));
    assert!(matches!(
        image.write_pixel(Position::new(0, 0), 0),
        Err(Error::NotAllowModify)
    ));

    // An unread parcel releases its owner with it.
    drop(parcel);
    image.fill(0xff11_2233).unwrap();
    assert_eq!(image.read_pixel(Position::new(3, 3)).unwrap(), 0xff11_2233);
}

#[test]
fn yuv_images_in_parcels() {
    for allocator in [
        AllocatorKind::Heap,
        AllocatorKind::SharedMemory,
        AllocatorKind::HardwareBuffer,
    ] {
        let mut image = YuvImageBuffer::new(&InitializationOptions {
            allocator,
            ..options(7, 5, PixelFormat::Nv21)
        })
        .unwrap();
        image.fill_yuv(YuvColor::new(30, 40, 50)).unwrap();
        image
            .write_yuv_pixel(Position::new(6, 4), YuvColor::new(1, 2, 3))
            .unwrap();

        let mut parcel = Parcel::new();
        image.marshal(&mut parcel).unwrap();
        let copy = AnyImageBuffer::unmarshal(&mut parcel).unwrap().into_yuv().unwrap();

        assert_eq!(copy.allocator(), allocator);
        assert_eq!(copy.info(), image.info());
        assert!(copy.is_same_image(&image), "{allocator:?}");
        assert_eq!(copy.get_yuv_pixel(6, 4), Some(YuvColor::new(1, 2, 3)));
    }
}

#[test]
fn images_follow_each_other() {
    let first = patterned(&options(2, 2, PixelFormat::Rgba8888));
    let second = YuvImageBuffer::new(&options(2, 2, PixelFormat::Yu12)).unwrap();

    let mut parcel = Parcel::new();
    first.marshal(&mut parcel).unwrap();
    second.marshal(&mut parcel).unwrap();

    assert!(matches!(AnyImageBuffer::unmarshal(&mut parcel), Ok(AnyImageBuffer::Rgb(_))));
    assert!(matches!(AnyImageBuffer::unmarshal(&mut parcel), Ok(AnyImageBuffer::Yuv(_))));
    assert!(AnyImageBuffer::unmarshal(&mut parcel).is_err());
}

/// A parcel header, fields in wire order.
struct Header {
    width: i32,
    height: i32,
    format: i32,
    allocator: i32,
    row_data_size: i32,
    buffer_size: i32,
}

impl Header {
    fn rgba(width: i32, height: i32) -> Self {
        Header {
            width,
            height,
            format: PixelFormat::Rgba8888.to_raw(),
            allocator: AllocatorKind::Heap.to_raw(),
            row_data_size: width * 4,
            buffer_size: width * height * 4,
        }
    }

    fn write(&self, parcel: &mut Parcel) {
        parcel.write_i32(self.width);
        parcel.write_i32(self.height);
        parcel.write_i32(self.format);
        parcel.write_i32(ColorSpace::Srgb.to_raw());
        parcel.write_i32(AlphaType::Premul.to_raw());
        parcel.write_i32(0);
        parcel.write_bool(true);
        parcel.write_i32(self.allocator);
        parcel.write_i32(self.row_data_size);
        parcel.write_i32(self.buffer_size);
    }
}

fn unmarshal(header: Header, payload: &[u8]) -> Result<AnyImageBuffer, Error> {
    let mut parcel = Parcel::new();
    header.write(&mut parcel);
    parcel.write_buffer(payload);
    AnyImageBuffer::unmarshal(&mut parcel)
}

#[test]
fn hand_written_parcels() {
    let image = unmarshal(Header::rgba(2, 1), &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    let image = image.into_rgb().unwrap();
    assert_eq!(image.pixels().unwrap(), &[1, 2, 3, 4, 5, 6, 7, 8][..]);
}

#[test]
fn malformed_parcels_fail() {
    let payload = [0u8; 64];
    let cases = [
        Header {
            width: -2,
            ..Header::rgba(2, 2)
        },
        Header {
            format: 99,
            ..Header::rgba(2, 2)
        },
        Header {
            format: PixelFormat::Unknown.to_raw(),
            ..Header::rgba(2, 2)
        },
        Header {
            allocator: 9,
            ..Header::rgba(2, 2)
        },
        Header {
            row_data_size: 12,
            ..Header::rgba(2, 2)
        },
        Header {
            buffer_size: 15,
            ..Header::rgba(2, 2)
        },
        Header {
            buffer_size: -1,
            ..Header::rgba(2, 2)
        },
        // Claims more bytes than the parcel holds.
        Header {
            buffer_size: 128,
            ..Header::rgba(2, 2)
        },
        // Shared memory without a descriptor.
        Header {
            allocator: AllocatorKind::SharedMemory.to_raw(),
            ..Header::rgba(2, 2)
        },
    ];

    for header in cases {
        assert!(matches!(
            unmarshal(header, &payload),
            Err(Error::SerializationFailed(_))
        ));
    }

    assert!(AnyImageBuffer::unmarshal(&mut Parcel::new()).is_err());
}

#[test]
fn tlv_round_trips() {
    let mut rgb = patterned(&options(300, 2, PixelFormat::Rgb565));
    rgb.set_editable(false);
    let record = rgb.encode_tlv().unwrap();
    // Width comes first, as a varint inside a length prefix.
    assert_eq!(record[..4], [Tag::Width as u8, 2, 0xac, 0x02]);
    assert_eq!(record.last(), Some(&(Tag::End as u8)));

    let copy = AnyImageBuffer::decode_tlv(&record).unwrap().into_rgb().unwrap();
    assert_same_description(&rgb, &copy);
    assert_eq!(copy.base_density(), 160);

    let mut yuv = YuvImageBuffer::new(&options(7, 5, PixelFormat::YcbcrP010)).unwrap();
    yuv.fill_yuv(YuvColor::new(9, 8, 7)).unwrap();
    let record = AnyImageBuffer::from(yuv).encode_tlv().unwrap();
    let copy = AnyImageBuffer::decode_tlv(&record).unwrap().into_yuv().unwrap();
    assert_eq!(copy.get_yuv_pixel(6, 4), Some(YuvColor::new(9, 8, 7)));
    assert_eq!(copy.byte_count(), 2 * (35 + 2 * 12));
}

#[test]
fn tlv_keeps_the_allocator() {
    let image = patterned(&InitializationOptions {
        allocator: AllocatorKind::SharedMemory,
        ..options(4, 4, PixelFormat::Rgba8888)
    });
    let copy = AnyImageBuffer::decode_tlv(&image.encode_tlv().unwrap())
        .unwrap()
        .into_rgb()
        .unwrap();
    assert_eq!(copy.allocator(), AllocatorKind::SharedMemory);
    assert!(copy.is_same_image(&image));
}

#[test]
fn tlv_skips_unknown_tags() {
    let image = patterned(&options(2, 2, PixelFormat::Bgra8888));
    let mut record = image.encode_tlv().unwrap();
    let end = record.len() - 1;
    record.splice(end..end, [42, 3, 0xde, 0xad, 0xbe]);

    let copy = AnyImageBuffer::decode_tlv(&record).unwrap().into_rgb().unwrap();
    assert!(copy.is_same_image(&image));
}

/// A record of scalar entries, values below 128.
fn record(entries: &[(Tag, u8)], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for &(tag, value) in entries {
        out.extend([tag as u8, 1, value]);
    }
    out.extend([Tag::Data as u8, data.len() as u8]);
    out.extend_from_slice(data);
    out.push(Tag::End as u8);
    out
}

#[test]
fn minimal_tlv_records() {
    let bytes = record(
        &[
            (Tag::Width, 2),
            (Tag::Height, 1),
            (Tag::PixelFormat, PixelFormat::Alpha8.to_raw() as u8),
        ],
        &[7, 8, 0, 0],
    );
    let image = AnyImageBuffer::decode_tlv(&bytes).unwrap().into_rgb().unwrap();
    assert_eq!(image.get_pixel8(1, 0), Some(8));
    assert_eq!(image.alpha_type(), AlphaType::Unknown);
    assert_eq!(image.allocator(), AllocatorKind::Heap);
    assert!(image.is_editable());
}

#[test]
fn malformed_tlv_records_fail() {
    let rgba = PixelFormat::Rgba8888.to_raw() as u8;
    let complete = [(Tag::Width, 1), (Tag::Height, 1), (Tag::PixelFormat, rgba)];

    let cases = [
        // Missing height.
        record(&[(Tag::Width, 1), (Tag::PixelFormat, rgba)], &[0; 4]),
        // Unknown and out of range formats.
        record(&[(Tag::Width, 1), (Tag::Height, 1), (Tag::PixelFormat, 0)], &[0; 4]),
        record(&[(Tag::Width, 1), (Tag::Height, 1), (Tag::PixelFormat, 99)], &[0; 4]),
        // Data of the wrong size.
        record(&complete, &[0; 3]),
        record(&complete, &[0; 5]),
        // Out of range enumerations.
        record(&[(Tag::Width, 1), (Tag::Height, 1), (Tag::PixelFormat, rgba), (Tag::ColorSpace, 40)], &[0; 4]),
        record(&[(Tag::Width, 1), (Tag::Height, 1), (Tag::PixelFormat, rgba), (Tag::Allocator, 9)], &[0; 4]),
    ];

    for bytes in cases {
        assert!(matches!(
            AnyImageBuffer::decode_tlv(&bytes),
            Err(Error::SerializationFailed(_))
        ));
    }

    let valid = record(&complete, &[1, 2, 3, 4]);
    assert!(AnyImageBuffer::decode_tlv(&valid).is_ok());
    // Every strict prefix is truncated.
    for len in 0..valid.len() {
        assert!(AnyImageBuffer::decode_tlv(&valid[..len]).is_err(), "prefix {len}");
    }

    // A length running past the end of the record.
    let mut overlong = valid.clone();
    overlong[1] = 9;
    assert!(AnyImageBuffer::decode_tlv(&overlong).is_err());
}
