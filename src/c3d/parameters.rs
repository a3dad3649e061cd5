//! Parameter section: groups and parameters encoded as a [`MetaData`] tree.
//!
//! Record layout (after the 4-byte section header):
//!
//! ```text
//! i8  name length (negative = locked, 0 = end)
//! i8  id (negative = group id, positive = id of the owning group)
//! ..  name
//! u16 offset to the next record, counted from this field (0 = last)
//! group:     u8 description length, description
//! parameter: i8 type, u8 rank, rank x u8 dims, data,
//!            u8 description length, description
//! ```

use tracing::{debug, warn};

use super::format::*;
use super::stream::{ByteReader, ByteWriter, latin1, to_latin1};
use crate::core::{EntryId, Format, MetaData, TypedValue, Values};
use crate::util::{Dimensions, Error, Result};

struct RawGroup {
    id: i8,
    name: String,
    description: String,
    locked: bool,
}

struct RawParameter {
    group_id: i8,
    name: String,
    description: String,
    locked: bool,
    value: TypedValue,
}

/// Decode the parameter section starting at `start` into a metadata tree.
pub fn read_parameters(data: &[u8], start: usize, order: ByteOrder) -> Result<MetaData> {
    let mut r = ByteReader::new(data, order);
    r.seek(start)?;
    let _reserved = r.read_u8()?;
    let _key = r.read_u8()?;
    let num_blocks = r.read_u8()? as usize;
    let processor = r.read_u8()?;
    debug!(num_blocks, processor, %order, "parameter section");

    // Some writers report 0 blocks; fall back to the whole file.
    let end = if num_blocks > 0 {
        (start + num_blocks * BLOCK_SIZE).min(data.len())
    } else {
        data.len()
    };

    let mut groups: Vec<RawGroup> = Vec::new();
    let mut params: Vec<RawParameter> = Vec::new();

    while r.pos() + 2 <= end {
        let name_len = r.read_i8()?;
        let id = r.read_i8()?;
        if name_len == 0 || id == 0 {
            break;
        }
        let locked = name_len < 0;
        let name = r.read_string(name_len.unsigned_abs() as usize)?;
        let offset_pos = r.pos();
        let offset = r.read_u16()? as usize;
        let next = offset_pos + offset;

        if id < 0 {
            let desc_len = r.read_u8()? as usize;
            let description = r.read_string(desc_len)?;
            groups.push(RawGroup {
                id: -id,
                name,
                description,
                locked,
            });
        } else {
            let tag = r.read_i8()?;
            let format = Format::from_tag(tag).ok_or_else(|| {
                Error::decode(format!("parameter '{}' has unknown type {}", name, tag))
            })?;
            let rank = r.read_u8()? as usize;
            let dims = Dimensions::from_slice(r.read_bytes(rank)?);
            let value = read_value(&mut r, format, dims)?;
            let desc_len = r.read_u8()? as usize;
            let description = r.read_string(desc_len)?;
            params.push(RawParameter {
                group_id: id,
                name,
                description,
                locked,
                value,
            });
        }

        if offset == 0 {
            break;
        }
        if next > end {
            warn!(next, end, "parameter record points past the section");
            break;
        }
        r.seek(next)?;
    }

    let mut md = MetaData::new();
    let root = md.root();
    let mut ids: Vec<(i8, EntryId)> = Vec::with_capacity(groups.len());
    for g in groups {
        let entry = md.child_or_insert(root, g.name.trim())?;
        if let Some(e) = md.get_mut(entry) {
            e.set_description(g.description.trim_end());
            e.set_unlocked(!g.locked);
        }
        ids.push((g.id, entry));
    }
    for p in params {
        let Some(&(_, group)) = ids.iter().find(|(id, _)| *id == p.group_id) else {
            warn!(parameter = %p.name, group_id = p.group_id, "parameter without group skipped");
            continue;
        };
        let entry = md.child_or_insert(group, p.name.trim())?;
        if let Some(e) = md.get_mut(entry) {
            e.set_description(p.description.trim_end());
            e.set_unlocked(!p.locked);
            e.set_info(Some(p.value));
        }
    }
    debug!(groups = md.groups().len(), entries = md.len(), "parameters decoded");
    Ok(md)
}

/// Most blank strings a zero-width character value may declare.
const MAX_BLANK_STRINGS: usize = u16::MAX as usize;

fn read_value(r: &mut ByteReader<'_>, format: Format, dims: Dimensions) -> Result<TypedValue> {
    // Dims come from the file: the data must be present before anything is allocated
    let eof = || Error::UnexpectedEof((r.pos() + r.remaining()) as u64);
    let count = checked_product(dims.sizes()).ok_or_else(eof)?;
    let size = count.checked_mul(format.element_size()).ok_or_else(eof)?;
    if size > r.remaining() {
        return Err(eof());
    }
    let values = match format {
        Format::Char => {
            let width = dims.size(0).map(|d| d as usize).unwrap_or(1);
            let bytes = r.read_bytes(size)?;
            let strings = if width == 0 {
                let n = checked_product(dims.sizes().get(1..).unwrap_or(&[]))
                    .filter(|&n| n <= MAX_BLANK_STRINGS)
                    .ok_or_else(|| Error::decode(format!("too many blank strings (dims {:?})", dims.sizes())))?;
                vec![String::new(); n]
            } else {
                bytes.chunks(width).map(latin1).collect()
            };
            Values::Char(strings)
        }
        Format::Byte => Values::Byte(r.read_bytes(count)?.iter().map(|&b| b as i8).collect()),
        Format::Integer => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(r.read_i16()?);
            }
            Values::Integer(v)
        }
        Format::Real => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(r.read_f32()?);
            }
            Values::Real(v)
        }
    };
    Ok(TypedValue::with_values(dims, values))
}

fn checked_product(sizes: &[u8]) -> Option<usize> {
    sizes.iter().try_fold(1usize, |n, &d| n.checked_mul(d as usize))
}

fn clamp_name(name: &str) -> Vec<u8> {
    let mut bytes = to_latin1(&name.to_ascii_uppercase());
    bytes.truncate(i8::MAX as usize);
    bytes
}

fn clamp_description(text: &str) -> Vec<u8> {
    let mut bytes = to_latin1(text);
    bytes.truncate(u8::MAX as usize);
    bytes
}

fn write_name(w: &mut ByteWriter, name: &[u8], locked: bool, id: i8) -> Result<()> {
    // A zero length ends the section on read
    if name.is_empty() {
        let owner = if id < 0 { "group" } else { "parameter" };
        return Err(Error::encode(format!("{} {} has an empty name", owner, id.unsigned_abs())));
    }
    let len = name.len() as i8;
    w.write_i8(if locked { -len } else { len });
    w.write_i8(id);
    w.write_bytes(name);
    Ok(())
}

/// Encode a metadata tree as a parameter section, padded to whole blocks.
///
/// Only groups directly under the root and their value-carrying children are
/// written.
pub fn write_parameters(md: &MetaData, order: ByteOrder) -> Result<Vec<u8>> {
    let processor = order
        .processor()
        .ok_or_else(|| Error::config("byte order must be set to write parameters"))?;
    let mut w = ByteWriter::new(order);
    w.write_bytes(&[1, PARAMETER_KEY, 0, processor]);

    let mut last_offset: Option<usize> = None;
    let groups = md.groups();
    if groups.len() > i8::MAX as usize {
        return Err(Error::encode(format!("too many groups ({})", groups.len())));
    }
    for (gi, &gid) in groups.iter().enumerate() {
        let Some(group) = md.get(gid) else { continue };
        let id = (gi + 1) as i8;
        let name = clamp_name(group.name());
        let desc = clamp_description(group.description());
        write_name(&mut w, &name, !group.is_unlocked(), -id)?;
        last_offset = Some(w.pos());
        w.write_u16((2 + 1 + desc.len()) as u16);
        w.write_u8(desc.len() as u8);
        w.write_bytes(&desc);

        for &pid in group.children() {
            let Some(param) = md.get(pid) else { continue };
            let Some(value) = param.info() else { continue };
            let name = clamp_name(param.name());
            let desc = clamp_description(param.description());
            write_name(&mut w, &name, !param.is_unlocked(), id)?;
            let offset_pos = w.pos();
            w.write_u16(0);
            let dims = value.dimensions();
            w.write_i8(value.format().tag());
            w.write_u8(dims.rank() as u8);
            w.write_bytes(dims.sizes());
            write_value(&mut w, value)?;
            w.write_u8(desc.len() as u8);
            w.write_bytes(&desc);
            let offset = w.pos() - offset_pos;
            if offset > u16::MAX as usize {
                return Err(Error::encode(format!(
                    "parameter {}:{} is too large ({} bytes)",
                    group.name(),
                    param.name(),
                    offset
                )));
            }
            w.patch_u16(offset_pos, offset as u16);
            last_offset = Some(offset_pos);
        }
    }
    if let Some(pos) = last_offset {
        w.patch_u16(pos, 0);
    }
    w.pad_to_block();
    let blocks = w.pos() / BLOCK_SIZE;
    if blocks > u8::MAX as usize {
        return Err(Error::encode(format!("parameter section too large ({} blocks)", blocks)));
    }
    w.patch_u8(2, blocks as u8);
    Ok(w.into_inner())
}

fn write_value(w: &mut ByteWriter, value: &TypedValue) -> Result<()> {
    match value.values() {
        Values::Char(strings) => {
            let width = value.dimensions().size(0).map(|d| d as usize).unwrap_or(1);
            for s in strings {
                w.write_string(s, width);
            }
        }
        Values::Byte(v) => v.iter().for_each(|&x| w.write_i8(x)),
        Values::Integer(v) => v.iter().for_each(|&x| w.write_i16(x)),
        Values::Real(v) => {
            for &x in v {
                w.write_f32(x)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::ErrorKind;

    fn sample() -> Result<MetaData> {
        let mut md = MetaData::new();
        md.set_value("POINT", "USED", TypedValue::from(26i16))?;
        md.set_value("POINT", "SCALE", TypedValue::from(-0.08333f32))?;
        md.set_value("POINT", "LABELS", TypedValue::from_vec(vec!["RFT1", "RFT2", "RHEEL"]))?;
        md.set_value("ANALOG", "GAIN", TypedValue::from_vec(vec![1i16, 2, 3]))?;
        md.set_value("FORCE_PLATFORM", "CORNERS", TypedValue::new(Format::Real, vec![3u8, 4, 0]))?;
        md.set_value("CUSTOM", "FLAGS", TypedValue::from_vec(vec![-3i8, 7]))?;
        let point = md.find("POINT").unwrap();
        md.get_mut(point).unwrap().set_description("3-D point parameters");
        let scale = md.find("POINT:SCALE").unwrap();
        md.get_mut(scale).unwrap().set_unlocked(false);
        Ok(md)
    }

    #[test]
    fn test_roundtrip_all_orders() -> Result<()> {
        let md = sample()?;
        for order in [ByteOrder::VaxLittleEndian, ByteOrder::IeeeLittleEndian, ByteOrder::IeeeBigEndian] {
            let bytes = write_parameters(&md, order)?;
            assert_eq!(bytes.len() % BLOCK_SIZE, 0);
            assert_eq!(bytes[2] as usize, bytes.len() / BLOCK_SIZE);
            assert_eq!(bytes[3], order.processor().unwrap());

            let back = read_parameters(&bytes, 0, order)?;
            assert_eq!(back, md);
        }
        Ok(())
    }

    #[test]
    fn test_orphan_parameter_is_skipped() -> Result<()> {
        let mut w = ByteWriter::new(ByteOrder::IeeeLittleEndian);
        w.write_bytes(&[1, PARAMETER_KEY, 1, PROCESSOR_INTEL]);
        // parameter "X" in group 5, which does not exist
        w.write_i8(1);
        w.write_i8(5);
        w.write_bytes(b"X");
        w.write_u16(0);
        w.write_i8(2);
        w.write_u8(0);
        w.write_i16(7);
        w.write_u8(0);
        w.pad_to_block();
        let md = read_parameters(w.as_bytes(), 0, ByteOrder::IeeeLittleEndian)?;
        assert!(md.groups().is_empty());
        Ok(())
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let mut w = ByteWriter::new(ByteOrder::IeeeLittleEndian);
        w.write_bytes(&[1, PARAMETER_KEY, 1, PROCESSOR_INTEL]);
        w.write_i8(1);
        w.write_i8(1);
        w.write_bytes(b"X");
        w.write_u16(0);
        w.write_i8(3);
        w.pad_to_block();
        let err = read_parameters(w.as_bytes(), 0, ByteOrder::IeeeLittleEndian).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    /// One group "G" with a single parameter "X" holding only its header.
    fn oversized(tag: i8, dims: &[u8]) -> Vec<u8> {
        let mut w = ByteWriter::new(ByteOrder::IeeeLittleEndian);
        w.write_bytes(&[1, PARAMETER_KEY, 1, PROCESSOR_INTEL]);
        w.write_i8(1);
        w.write_i8(-1);
        w.write_bytes(b"G");
        w.write_u16(3);
        w.write_u8(0);
        w.write_i8(1);
        w.write_i8(1);
        w.write_bytes(b"X");
        w.write_u16(0);
        w.write_i8(tag);
        w.write_u8(dims.len() as u8);
        w.write_bytes(dims);
        w.pad_to_block();
        w.into_inner()
    }

    #[test]
    fn test_declared_size_beyond_section() {
        for tag in [-1i8, 1, 2, 4] {
            let bytes = oversized(tag, &[255; 7]);
            let err = read_parameters(&bytes, 0, ByteOrder::IeeeLittleEndian).unwrap_err();
            assert!(matches!(err, Error::UnexpectedEof(_)));
            assert_eq!(err.kind(), ErrorKind::Decode);
        }
        // just past the end of the block
        let bytes = oversized(4, &[250, 2]);
        assert!(read_parameters(&bytes, 0, ByteOrder::IeeeLittleEndian).is_err());
    }

    #[test]
    fn test_blank_strings_are_bounded() -> Result<()> {
        let bytes = oversized(-1, &[0, 255, 255, 255]);
        let err = read_parameters(&bytes, 0, ByteOrder::IeeeLittleEndian).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);

        let bytes = oversized(-1, &[0, 3]);
        let md = read_parameters(&bytes, 0, ByteOrder::IeeeLittleEndian)?;
        assert_eq!(md.value("G", "X").map(|v| v.to_trimmed_strings().len()), Some(3));
        Ok(())
    }

    #[test]
    fn test_empty_name_is_rejected() -> Result<()> {
        let mut md = sample()?;
        md.set_value("POINT", "", TypedValue::from(1i16))?;
        let err = write_parameters(&md, ByteOrder::IeeeLittleEndian).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encode);

        let mut md = sample()?;
        md.child_or_insert(md.root(), "")?;
        assert!(matches!(write_parameters(&md, ByteOrder::IeeeBigEndian), Err(Error::Encode(_))));
        Ok(())
    }

    #[test]
    fn test_vax_overflow_in_parameter() -> Result<()> {
        let mut md = sample()?;
        md.set_value("CUSTOM", "HUGE", TypedValue::from(f32::MAX))?;
        assert!(write_parameters(&md, ByteOrder::IeeeLittleEndian).is_ok());
        let err = write_parameters(&md, ByteOrder::VaxLittleEndian).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encode);
        Ok(())
    }

    #[test]
    fn test_truncated_section() {
        let md = sample().unwrap();
        let bytes = write_parameters(&md, ByteOrder::IeeeLittleEndian).unwrap();
        // cut inside the first group's parameters, ignoring the declared size
        let cut = &bytes[..40];
        assert!(read_parameters(cut, 0, ByteOrder::IeeeLittleEndian).is_err());
    }
}
