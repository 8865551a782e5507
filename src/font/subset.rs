//! TrueType subset materialization.
//!
//! Takes the donor font bytes and one subset's codepoint list and produces a
//! self-contained font program containing only those glyphs, renumbered
//! contiguously from 0 in subset order. Composite glyphs pull their
//! component glyphs into the output (beyond the text-addressable range) and
//! have their component references rewritten to the new ids.
//!
//! Only the tables a PDF consumer needs survive: `cmap glyf head hhea hmtx
//! loca maxp`, rebuilt or patched. Signatures, layout tables, and hinting
//! programs are dropped rather than rewritten. Every multi-byte field is
//! read and written through the explicit big-endian helpers at the bottom of
//! this file; nothing relies on host byte order.

use std::collections::HashMap;

use crate::error::{PdfError, Result};

const SFNT_VERSION: u32 = 0x0001_0000;
const HEAD_MAGIC: u32 = 0x5F0F_3CF5;
const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

// Composite glyph component flags.
const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

fn format_error(msg: &str) -> PdfError {
    PdfError::FontFormat(msg.to_string())
}

/// Generate the embeddable font program for one subset.
///
/// `codepoints` is the subset in assignment order; `glyph_ids` maps each
/// codepoint to its donor glyph id (unmapped codepoints render as glyph 0).
pub(crate) fn generate_subset_font(
    donor: &[u8],
    codepoints: &[char],
    glyph_ids: &HashMap<char, u16>,
) -> Result<Vec<u8>> {
    let dir = parse_directory(donor)?;

    let head = find_table(donor, &dir, b"head").ok_or_else(|| format_error("missing head table"))?;
    let hhea = find_table(donor, &dir, b"hhea").ok_or_else(|| format_error("missing hhea table"))?;
    let maxp = find_table(donor, &dir, b"maxp").ok_or_else(|| format_error("missing maxp table"))?;
    let loca = find_table(donor, &dir, b"loca").ok_or_else(|| format_error("missing loca table"))?;
    let glyf = find_table(donor, &dir, b"glyf").ok_or_else(|| format_error("missing glyf table"))?;
    let hmtx = find_table(donor, &dir, b"hmtx").ok_or_else(|| format_error("missing hmtx table"))?;
    // The donor character map must exist even though the subset rebuilds its
    // own from the codepoint list.
    find_table(donor, &dir, b"cmap").ok_or_else(|| format_error("missing cmap table"))?;

    if head.len() < 54 {
        return Err(format_error("head table truncated"));
    }
    if read_u32(head, 12)? != HEAD_MAGIC {
        return Err(format_error("bad head table magic"));
    }
    if read_u32(maxp, 0)? != SFNT_VERSION {
        return Err(format_error("unsupported maxp table version"));
    }
    let num_glyphs = read_u16(maxp, 4)?;
    let loca_format = read_i16(head, 50)?;
    let loca_offsets = parse_loca(loca, loca_format, num_glyphs)?;

    // Local glyph order: the subset's codepoints, then any composite
    // components pulled in transitively.
    let mut donor_gids: Vec<u16> = Vec::with_capacity(codepoints.len());
    let mut remap: HashMap<u16, u16> = HashMap::new();
    for &ch in codepoints {
        let gid = glyph_ids.get(&ch).copied().unwrap_or(0);
        remap.entry(gid).or_insert(donor_gids.len() as u16);
        donor_gids.push(gid);
    }
    let mut cursor = 0;
    while cursor < donor_gids.len() {
        let gid = donor_gids[cursor];
        cursor += 1;
        for component in composite_components(glyf, &loca_offsets, gid)? {
            if !remap.contains_key(&component) {
                remap.insert(component, donor_gids.len() as u16);
                donor_gids.push(component);
            }
        }
    }

    let (new_glyf, new_loca_offsets) = rebuild_glyf(glyf, &loca_offsets, &donor_gids, &remap)?;
    let new_loca_format: i16 = if new_glyf.len() > 0x1FFFE { 1 } else { 0 };
    let new_loca = build_loca(&new_loca_offsets, new_loca_format);

    let num_h_metrics = read_u16(hhea, 34)? as usize;
    let new_hmtx = rebuild_hmtx(hmtx, &donor_gids, num_h_metrics)?;

    let new_head = rebuild_head(head, new_loca_format)?;
    let new_hhea = rebuild_hhea(hhea, donor_gids.len() as u16)?;
    let new_maxp = rebuild_maxp(maxp, donor_gids.len() as u16)?;
    let new_cmap = build_cmap_format4(codepoints);

    // Tag order is already sorted, as the directory requires.
    let mut tables: Vec<(u32, Vec<u8>)> = vec![
        (tag_u32(b"cmap"), new_cmap),
        (tag_u32(b"glyf"), new_glyf),
        (tag_u32(b"head"), new_head),
        (tag_u32(b"hhea"), new_hhea),
        (tag_u32(b"hmtx"), new_hmtx),
        (tag_u32(b"loca"), new_loca),
        (tag_u32(b"maxp"), new_maxp),
    ];
    Ok(write_font_file(&mut tables))
}

// ─── Donor parsing ──────────────────────────────────────────────

struct DirEntry {
    tag: [u8; 4],
    offset: u32,
    length: u32,
}

fn parse_directory(data: &[u8]) -> Result<Vec<DirEntry>> {
    if data.len() < 12 {
        return Err(format_error("font file too short"));
    }
    if read_u32(data, 0)? != SFNT_VERSION {
        return Err(format_error("bad sfnt version, not a TrueType font"));
    }
    let num_tables = read_u16(data, 4)? as usize;
    let mut dir = Vec::with_capacity(num_tables);
    for i in 0..num_tables {
        let at = 12 + i * 16;
        if at + 16 > data.len() {
            return Err(format_error("table directory truncated"));
        }
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&data[at..at + 4]);
        let offset = read_u32(data, at + 8)?;
        let length = read_u32(data, at + 12)?;
        if offset as usize + length as usize > data.len() {
            return Err(format_error("table extends past end of file"));
        }
        dir.push(DirEntry { tag, offset, length });
    }
    Ok(dir)
}

fn find_table<'a>(data: &'a [u8], dir: &[DirEntry], tag: &[u8; 4]) -> Option<&'a [u8]> {
    dir.iter()
        .find(|e| &e.tag == tag)
        .map(|e| &data[e.offset as usize..(e.offset + e.length) as usize])
}

fn parse_loca(data: &[u8], format: i16, num_glyphs: u16) -> Result<Vec<u32>> {
    let count = num_glyphs as usize + 1;
    let mut offsets = Vec::with_capacity(count);
    match format {
        0 => {
            if data.len() < count * 2 {
                return Err(format_error("short loca table truncated"));
            }
            for i in 0..count {
                offsets.push(read_u16(data, i * 2)? as u32 * 2);
            }
        }
        1 => {
            if data.len() < count * 4 {
                return Err(format_error("long loca table truncated"));
            }
            for i in 0..count {
                offsets.push(read_u32(data, i * 4)?);
            }
        }
        _ => return Err(format_error("unknown loca format")),
    }
    Ok(offsets)
}

/// Glyph record bounds for a donor glyph; None for empty glyphs.
fn glyph_record<'a>(glyf: &'a [u8], loca: &[u32], gid: u16) -> Result<Option<&'a [u8]>> {
    let idx = gid as usize;
    if idx + 1 >= loca.len() {
        return Err(format_error("glyph id outside loca table"));
    }
    let start = loca[idx] as usize;
    let end = loca[idx + 1] as usize;
    if start == end {
        return Ok(None);
    }
    if start > end || end > glyf.len() {
        return Err(format_error("inconsistent loca offsets"));
    }
    Ok(Some(&glyf[start..end]))
}

/// The donor glyph ids referenced by a composite glyph, in record order.
/// Simple and empty glyphs yield nothing.
fn composite_components(glyf: &[u8], loca: &[u32], gid: u16) -> Result<Vec<u16>> {
    let Some(record) = glyph_record(glyf, loca, gid)? else {
        return Ok(Vec::new());
    };
    if read_i16(record, 0)? >= 0 {
        return Ok(Vec::new());
    }

    let mut components = Vec::new();
    let mut pos = 10; // header: contour count + bbox
    loop {
        let flags = read_u16(record, pos)?;
        components.push(read_u16(record, pos + 2)?);
        pos += 4;
        pos += if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
        if flags & WE_HAVE_A_SCALE != 0 {
            pos += 2;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            pos += 4;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            pos += 8;
        }
        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }
    Ok(components)
}

// ─── Table rebuilding ───────────────────────────────────────────

fn rebuild_glyf(
    glyf: &[u8],
    loca: &[u32],
    donor_gids: &[u16],
    remap: &HashMap<u16, u16>,
) -> Result<(Vec<u8>, Vec<u32>)> {
    let mut new_glyf: Vec<u8> = Vec::new();
    let mut new_offsets: Vec<u32> = Vec::with_capacity(donor_gids.len() + 1);

    for &gid in donor_gids {
        new_offsets.push(new_glyf.len() as u32);
        let Some(record) = glyph_record(glyf, loca, gid)? else {
            continue;
        };
        let mut copied = record.to_vec();
        if read_i16(&copied, 0)? < 0 {
            rewrite_composite_refs(&mut copied, remap)?;
        }
        new_glyf.extend_from_slice(&copied);
        // Keep every record 4-byte aligned so short loca offsets stay exact.
        while new_glyf.len() % 4 != 0 {
            new_glyf.push(0);
        }
    }
    new_offsets.push(new_glyf.len() as u32);
    Ok((new_glyf, new_offsets))
}

fn rewrite_composite_refs(record: &mut [u8], remap: &HashMap<u16, u16>) -> Result<()> {
    let mut pos = 10;
    loop {
        let flags = read_u16(record, pos)?;
        let donor_gid = read_u16(record, pos + 2)?;
        let local = remap
            .get(&donor_gid)
            .copied()
            .ok_or_else(|| format_error("composite component missing from subset"))?;
        write_u16(record, pos + 2, local)?;
        pos += 4;
        pos += if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
        if flags & WE_HAVE_A_SCALE != 0 {
            pos += 2;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            pos += 4;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            pos += 8;
        }
        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }
    Ok(())
}

fn build_loca(offsets: &[u32], format: i16) -> Vec<u8> {
    let mut data = Vec::with_capacity(offsets.len() * 4);
    if format == 0 {
        for &offset in offsets {
            data.extend_from_slice(&((offset / 2) as u16).to_be_bytes());
        }
    } else {
        for &offset in offsets {
            data.extend_from_slice(&offset.to_be_bytes());
        }
    }
    data
}

/// Every subset glyph gets a full advance + left side bearing pair.
fn rebuild_hmtx(hmtx: &[u8], donor_gids: &[u16], num_h_metrics: usize) -> Result<Vec<u8>> {
    if num_h_metrics == 0 {
        return Err(format_error("hhea reports zero metrics"));
    }
    let mut data = Vec::with_capacity(donor_gids.len() * 4);
    for &gid in donor_gids {
        let idx = gid as usize;
        if idx < num_h_metrics {
            let at = idx * 4;
            if at + 4 > hmtx.len() {
                return Err(format_error("hmtx table truncated"));
            }
            data.extend_from_slice(&hmtx[at..at + 4]);
        } else {
            // Monospaced tail: the last advance applies, bearings follow.
            let advance_at = (num_h_metrics - 1) * 4;
            let lsb_at = num_h_metrics * 4 + (idx - num_h_metrics) * 2;
            if advance_at + 2 > hmtx.len() || lsb_at + 2 > hmtx.len() {
                return Err(format_error("hmtx table truncated"));
            }
            data.extend_from_slice(&hmtx[advance_at..advance_at + 2]);
            data.extend_from_slice(&hmtx[lsb_at..lsb_at + 2]);
        }
    }
    Ok(data)
}

fn rebuild_head(head: &[u8], loca_format: i16) -> Result<Vec<u8>> {
    let mut out = head.to_vec();
    write_u32(&mut out, 8, 0)?; // checkSumAdjustment, fixed up at the end
    write_i16(&mut out, 50, loca_format)?;
    Ok(out)
}

fn rebuild_hhea(hhea: &[u8], num_glyphs: u16) -> Result<Vec<u8>> {
    if hhea.len() < 36 {
        return Err(format_error("hhea table truncated"));
    }
    let mut out = hhea.to_vec();
    write_u16(&mut out, 34, num_glyphs)?;
    Ok(out)
}

fn rebuild_maxp(maxp: &[u8], num_glyphs: u16) -> Result<Vec<u8>> {
    if maxp.len() < 6 {
        return Err(format_error("maxp table truncated"));
    }
    let mut out = maxp.to_vec();
    write_u16(&mut out, 4, num_glyphs)?;
    Ok(out)
}

/// A format 4 cmap with a single Windows Unicode BMP subtable mapping the
/// subset's codepoints to their local glyph ids. Codepoints outside the BMP
/// are omitted; their glyphs remain addressable through the text bytes.
fn build_cmap_format4(codepoints: &[char]) -> Vec<u8> {
    let mut mapped: Vec<(u16, u16)> = codepoints
        .iter()
        .enumerate()
        .filter(|(_, ch)| (**ch as u32) < 0xFFFF)
        .map(|(local, ch)| (*ch as u16, local as u16))
        .collect();
    mapped.sort_by_key(|(code, _)| *code);

    // Contiguous codepoint runs become segments.
    let mut segments: Vec<(u16, u16, Vec<u16>)> = Vec::new();
    for &(code, gid) in &mapped {
        if let Some(last) = segments.last_mut() {
            if code == last.1 + 1 {
                last.1 = code;
                last.2.push(gid);
                continue;
            }
        }
        segments.push((code, code, vec![gid]));
    }
    segments.push((0xFFFF, 0xFFFF, vec![0])); // required sentinel

    let seg_count = segments.len() as u16;
    let seg_count_x2 = seg_count * 2;
    let entry_selector = (seg_count as f64).log2().floor() as u16;
    let search_range = (1u16 << entry_selector) * 2;
    let range_shift = seg_count_x2.saturating_sub(search_range);

    let mut glyph_id_array: Vec<u16> = Vec::new();
    let mut end_codes = Vec::new();
    let mut start_codes = Vec::new();
    let mut id_deltas: Vec<i16> = Vec::new();
    let mut id_range_offsets: Vec<u16> = Vec::new();

    for (i, (start, end, gids)) in segments.iter().enumerate() {
        start_codes.push(*start);
        end_codes.push(*end);
        if *start == 0xFFFF {
            id_deltas.push(1);
            id_range_offsets.push(0);
        } else if gids.len() == 1 {
            id_deltas.push((gids[0] as i32 - *start as i32) as i16);
            id_range_offsets.push(0);
        } else {
            id_deltas.push(0);
            let remaining = (segments.len() - i) as u16;
            id_range_offsets.push((remaining + glyph_id_array.len() as u16) * 2);
            glyph_id_array.extend_from_slice(gids);
        }
    }

    let subtable_len = 14 + seg_count as usize * 8 + glyph_id_array.len() * 2;
    let mut subtable: Vec<u8> = Vec::with_capacity(subtable_len);
    subtable.extend_from_slice(&4u16.to_be_bytes());
    subtable.extend_from_slice(&(subtable_len as u16).to_be_bytes());
    subtable.extend_from_slice(&0u16.to_be_bytes()); // language
    subtable.extend_from_slice(&seg_count_x2.to_be_bytes());
    subtable.extend_from_slice(&search_range.to_be_bytes());
    subtable.extend_from_slice(&entry_selector.to_be_bytes());
    subtable.extend_from_slice(&range_shift.to_be_bytes());
    for &v in &end_codes {
        subtable.extend_from_slice(&v.to_be_bytes());
    }
    subtable.extend_from_slice(&0u16.to_be_bytes()); // reservedPad
    for &v in &start_codes {
        subtable.extend_from_slice(&v.to_be_bytes());
    }
    for &v in &id_deltas {
        subtable.extend_from_slice(&v.to_be_bytes());
    }
    for &v in &id_range_offsets {
        subtable.extend_from_slice(&v.to_be_bytes());
    }
    for &v in &glyph_id_array {
        subtable.extend_from_slice(&v.to_be_bytes());
    }

    let mut cmap: Vec<u8> = Vec::with_capacity(12 + subtable.len());
    cmap.extend_from_slice(&0u16.to_be_bytes()); // version
    cmap.extend_from_slice(&1u16.to_be_bytes()); // one encoding record
    cmap.extend_from_slice(&3u16.to_be_bytes()); // platform: Windows
    cmap.extend_from_slice(&1u16.to_be_bytes()); // encoding: Unicode BMP
    cmap.extend_from_slice(&12u32.to_be_bytes()); // subtable offset
    cmap.extend_from_slice(&subtable);
    cmap
}

// ─── Font file assembly ─────────────────────────────────────────

fn write_font_file(tables: &mut [(u32, Vec<u8>)]) -> Vec<u8> {
    let num_tables = tables.len() as u16;
    let entry_selector = (num_tables as f64).log2().floor() as u16;
    let search_range = (1u16 << entry_selector) * 16;
    let range_shift = (num_tables * 16).saturating_sub(search_range);

    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(&SFNT_VERSION.to_be_bytes());
    out.extend_from_slice(&num_tables.to_be_bytes());
    out.extend_from_slice(&search_range.to_be_bytes());
    out.extend_from_slice(&entry_selector.to_be_bytes());
    out.extend_from_slice(&range_shift.to_be_bytes());

    for (_, data) in tables.iter_mut() {
        while data.len() % 4 != 0 {
            data.push(0);
        }
    }

    let mut table_offset = 12 + tables.len() * 16;
    for (tag, data) in tables.iter() {
        out.extend_from_slice(&tag.to_be_bytes());
        out.extend_from_slice(&table_checksum(data).to_be_bytes());
        out.extend_from_slice(&(table_offset as u32).to_be_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        table_offset += data.len();
    }
    for (_, data) in tables.iter() {
        out.extend_from_slice(data);
    }

    fix_head_checksum(&mut out);
    out
}

fn table_checksum(data: &[u8]) -> u32 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        sum = sum.wrapping_add(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let mut last = [0u8; 4];
        last[..rest.len()].copy_from_slice(rest);
        sum = sum.wrapping_add(u32::from_be_bytes(last));
    }
    sum
}

/// Patch head.checkSumAdjustment so the whole file sums to the magic value.
///
/// Directory checksums were computed with the adjustment field zeroed, which
/// is also how consumers verify them; only the field itself changes here.
fn fix_head_checksum(out: &mut [u8]) {
    let num_tables = u16::from_be_bytes([out[4], out[5]]) as usize;
    let head_tag = tag_u32(b"head");
    for i in 0..num_tables {
        let dir_at = 12 + i * 16;
        let tag = u32::from_be_bytes([out[dir_at], out[dir_at + 1], out[dir_at + 2], out[dir_at + 3]]);
        if tag != head_tag {
            continue;
        }
        let table_at =
            u32::from_be_bytes([out[dir_at + 8], out[dir_at + 9], out[dir_at + 10], out[dir_at + 11]])
                as usize;
        let adjustment = CHECKSUM_MAGIC.wrapping_sub(table_checksum(out));
        out[table_at + 8..table_at + 12].copy_from_slice(&adjustment.to_be_bytes());
        return;
    }
}

// ─── Big-endian byte helpers ────────────────────────────────────

pub(crate) fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    if offset + 2 > data.len() {
        return Err(format_error("unexpected end of table"));
    }
    Ok(u16::from_be_bytes([data[offset], data[offset + 1]]))
}

pub(crate) fn read_i16(data: &[u8], offset: usize) -> Result<i16> {
    read_u16(data, offset).map(|v| v as i16)
}

pub(crate) fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    if offset + 4 > data.len() {
        return Err(format_error("unexpected end of table"));
    }
    Ok(u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ]))
}

pub(crate) fn write_u16(data: &mut [u8], offset: usize, val: u16) -> Result<()> {
    if offset + 2 > data.len() {
        return Err(format_error("write past end of table"));
    }
    data[offset..offset + 2].copy_from_slice(&val.to_be_bytes());
    Ok(())
}

pub(crate) fn write_i16(data: &mut [u8], offset: usize, val: i16) -> Result<()> {
    write_u16(data, offset, val as u16)
}

pub(crate) fn write_u32(data: &mut [u8], offset: usize, val: u32) -> Result<()> {
    if offset + 4 > data.len() {
        return Err(format_error("write past end of table"));
    }
    data[offset..offset + 4].copy_from_slice(&val.to_be_bytes());
    Ok(())
}

pub(crate) fn tag_u32(tag: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── helpers to build a small donor font ──

    fn simple_glyph() -> Vec<u8> {
        // One contour, three points; the subsetter copies records opaquely,
        // so only the leading contour count matters here.
        let mut g = Vec::new();
        g.extend_from_slice(&1i16.to_be_bytes()); // numberOfContours
        g.extend_from_slice(&[0; 8]); // bbox
        g.extend_from_slice(&2u16.to_be_bytes()); // endPtsOfContours[0]
        g.extend_from_slice(&0u16.to_be_bytes()); // instructionLength
        g.extend_from_slice(&[0x01, 0x01, 0x01]); // flags: on-curve, zero deltas
        g
    }

    fn composite_glyph(component: u16) -> Vec<u8> {
        let mut g = Vec::new();
        g.extend_from_slice(&(-1i16).to_be_bytes());
        g.extend_from_slice(&[0; 8]); // bbox
        g.extend_from_slice(&0x0002u16.to_be_bytes()); // ARGS_ARE_XY_VALUES
        g.extend_from_slice(&component.to_be_bytes());
        g.extend_from_slice(&[0, 0]); // byte args
        g
    }

    fn pad4(mut v: Vec<u8>) -> Vec<u8> {
        while v.len() % 4 != 0 {
            v.push(0);
        }
        v
    }

    /// Donor with three glyphs: 0 empty, 1 composite referencing 2, 2 simple.
    fn build_donor() -> Vec<u8> {
        let g1 = pad4(composite_glyph(2));
        let g2 = pad4(simple_glyph());
        let mut glyf = Vec::new();
        let loca_offsets = [0u32, 0, g1.len() as u32, (g1.len() + g2.len()) as u32];
        glyf.extend_from_slice(&g1);
        glyf.extend_from_slice(&g2);

        let mut head = vec![0u8; 54];
        write_u32(&mut head, 0, SFNT_VERSION).unwrap();
        write_u32(&mut head, 12, HEAD_MAGIC).unwrap();
        write_u16(&mut head, 18, 1000).unwrap(); // unitsPerEm
        write_i16(&mut head, 50, 0).unwrap(); // short loca

        let mut hhea = vec![0u8; 36];
        write_u32(&mut hhea, 0, SFNT_VERSION).unwrap();
        write_u16(&mut hhea, 34, 3).unwrap(); // numberOfHMetrics

        let mut maxp = vec![0u8; 32];
        write_u32(&mut maxp, 0, SFNT_VERSION).unwrap();
        write_u16(&mut maxp, 4, 3).unwrap();

        let mut loca = Vec::new();
        for off in loca_offsets {
            loca.extend_from_slice(&((off / 2) as u16).to_be_bytes());
        }

        let mut hmtx = Vec::new();
        for (adv, lsb) in [(500u16, 10i16), (600, 20), (700, 30)] {
            hmtx.extend_from_slice(&adv.to_be_bytes());
            hmtx.extend_from_slice(&lsb.to_be_bytes());
        }

        let cmap = vec![0u8; 4]; // presence only; the subset builds its own

        let mut tables: Vec<(u32, Vec<u8>)> = vec![
            (tag_u32(b"cmap"), cmap),
            (tag_u32(b"glyf"), glyf),
            (tag_u32(b"head"), head),
            (tag_u32(b"hhea"), hhea),
            (tag_u32(b"hmtx"), hmtx),
            (tag_u32(b"loca"), loca),
            (tag_u32(b"maxp"), maxp),
        ];
        write_font_file(&mut tables)
    }

    fn donor_map() -> HashMap<char, u16> {
        let mut m = HashMap::new();
        m.insert('A', 1u16);
        m.insert('B', 2u16);
        m
    }

    #[test]
    fn test_be_helpers_round_trip() {
        let mut buf = [0u8; 8];
        for v in [0u16, 1, 0x1234, u16::MAX] {
            write_u16(&mut buf, 2, v).unwrap();
            assert_eq!(read_u16(&buf, 2).unwrap(), v);
        }
        for v in [i16::MIN, -1, 0, i16::MAX] {
            write_i16(&mut buf, 0, v).unwrap();
            assert_eq!(read_i16(&buf, 0).unwrap(), v);
        }
        for v in [0u32, 0xDEADBEEF, u32::MAX] {
            write_u32(&mut buf, 4, v).unwrap();
            assert_eq!(read_u32(&buf, 4).unwrap(), v);
        }
    }

    #[test]
    fn test_be_helpers_reject_out_of_bounds() {
        let mut buf = [0u8; 3];
        assert!(read_u16(&buf, 2).is_err());
        assert!(read_u32(&buf, 0).is_err());
        assert!(write_u16(&mut buf, 2, 1).is_err());
    }

    #[test]
    fn test_checksum_known_value() {
        assert_eq!(table_checksum(b"ABCD"), 0x41424344);
        // Remainder bytes are zero-padded.
        assert_eq!(table_checksum(b"ABCDE"), 0x41424344u32.wrapping_add(0x45000000));
    }

    #[test]
    fn test_bad_magic_is_format_error() {
        let err = generate_subset_font(&[0u8; 64], &['A'], &donor_map()).unwrap_err();
        assert!(matches!(err, PdfError::FontFormat(_)));
    }

    #[test]
    fn test_missing_mandatory_table_is_format_error() {
        let mut tables: Vec<(u32, Vec<u8>)> = vec![(tag_u32(b"head"), vec![0u8; 54])];
        let partial = write_font_file(&mut tables);
        let err = generate_subset_font(&partial, &['A'], &donor_map()).unwrap_err();
        assert!(matches!(err, PdfError::FontFormat(_)));
    }

    #[test]
    fn test_composite_component_is_pulled_in_and_remapped() {
        let donor = build_donor();
        // Subset requests only 'A' (composite glyph 1); its component glyph 2
        // must be appended past the addressable range.
        let out = generate_subset_font(&donor, &['A'], &donor_map()).unwrap();

        let dir = parse_directory(&out).unwrap();
        let maxp = find_table(&out, &dir, b"maxp").unwrap();
        assert_eq!(read_u16(maxp, 4).unwrap(), 2);

        let glyf = find_table(&out, &dir, b"glyf").unwrap();
        // First record is the composite; its component ref must now be 1.
        assert_eq!(read_i16(glyf, 0).unwrap(), -1);
        assert_eq!(read_u16(glyf, 12).unwrap(), 1);
    }

    #[test]
    fn test_hmtx_follows_subset_order() {
        let donor = build_donor();
        let out = generate_subset_font(&donor, &['B', 'A'], &donor_map()).unwrap();
        let dir = parse_directory(&out).unwrap();
        let hmtx = find_table(&out, &dir, b"hmtx").unwrap();
        // 'B' is donor glyph 2 (advance 700), 'A' donor glyph 1 (600).
        assert_eq!(read_u16(hmtx, 0).unwrap(), 700);
        assert_eq!(read_u16(hmtx, 4).unwrap(), 600);
    }

    #[test]
    fn test_whole_file_checksum_balances() {
        let donor = build_donor();
        let out = generate_subset_font(&donor, &['A', 'B'], &donor_map()).unwrap();
        assert_eq!(table_checksum(&out), CHECKSUM_MAGIC);
    }

    #[test]
    fn test_subset_parses_with_ttf_parser() {
        let donor = build_donor();
        let out = generate_subset_font(&donor, &['A', 'B'], &donor_map()).unwrap();
        let face = ttf_parser::Face::parse(&out, 0).expect("subset font must parse");
        assert_eq!(face.number_of_glyphs(), 2);
        // The rebuilt cmap maps the subset codepoints to local ids.
        assert_eq!(face.glyph_index('A').map(|g| g.0), Some(0));
        assert_eq!(face.glyph_index('B').map(|g| g.0), Some(1));
    }

    #[test]
    fn test_cmap_sentinel_and_structure() {
        let cmap = build_cmap_format4(&['A', 'B', 'Z']);
        assert_eq!(read_u16(&cmap, 0).unwrap(), 0); // version
        assert_eq!(read_u16(&cmap, 2).unwrap(), 1); // one record
        assert_eq!(read_u16(&cmap, 4).unwrap(), 3); // Windows
        assert_eq!(read_u16(&cmap, 6).unwrap(), 1); // Unicode BMP
        let sub = read_u32(&cmap, 8).unwrap() as usize;
        assert_eq!(read_u16(&cmap, sub).unwrap(), 4); // format
    }
}
