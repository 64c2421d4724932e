//! 分块模块
//!
//! 将有序的提取单元按大小上限贪心切分为连续的块，不拆分任何单元

// 本地模块导入
use crate::document::DocumentNode;
use crate::extractor::TextSegment;

/// 可分块单元
pub trait ChunkUnit {
    /// 单元大小（字符数）
    fn size(&self) -> usize;
}

impl ChunkUnit for TextSegment {
    fn size(&self) -> usize {
        self.char_len()
    }
}

impl ChunkUnit for DocumentNode {
    fn size(&self) -> usize {
        self.serialize().chars().count()
    }
}

impl ChunkUnit for String {
    fn size(&self) -> usize {
        self.chars().count()
    }
}

impl ChunkUnit for str {
    fn size(&self) -> usize {
        self.chars().count()
    }
}

impl<T: ChunkUnit + ?Sized> ChunkUnit for &T {
    fn size(&self) -> usize {
        (**self).size()
    }
}

/// 一个块：连续的单元及其总大小
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<T> {
    pub units: Vec<T>,
    pub size: usize,
}

impl<T> Chunk<T> {
    fn empty() -> Self {
        Self {
            units: Vec::new(),
            size: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// 单个单元超过上限时形成的超大块
    pub fn is_oversized(&self, max_size: usize) -> bool {
        self.size > max_size
    }
}

/// 贪心切分
///
/// 累计大小不超过 `max_size` 时继续追加；追加下一个单元会超限时关闭当前块。
/// 超过上限的单个单元独占一个块。所有块按顺序拼接等于输入。
pub fn chunk<T: ChunkUnit>(units: Vec<T>, max_size: usize) -> Vec<Chunk<T>> {
    let mut chunks = Vec::new();
    let mut current = Chunk::empty();

    for unit in units {
        let size = unit.size();
        if !current.is_empty() && current.size + size > max_size {
            chunks.push(std::mem::replace(&mut current, Chunk::empty()));
        }
        current.size += size;
        current.units.push(unit);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized(sizes: &[usize]) -> Vec<String> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, size)| {
                let c = char::from(b'a' + (i % 26) as u8);
                std::iter::repeat(c).take(*size).collect()
            })
            .collect()
    }

    #[test]
    fn test_greedy_accumulation() {
        let chunks = chunk(sized(&[4, 4, 4, 4]), 10);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 2);
        assert_eq!(chunks[0].size, 8);
        assert_eq!(chunks[1].len(), 2);
    }

    #[test]
    fn test_exact_fit_stays_in_chunk() {
        let chunks = chunk(sized(&[5, 5, 1]), 10);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].size, 10);
        assert_eq!(chunks[1].size, 1);
    }

    #[test]
    fn test_oversized_unit_gets_own_chunk() {
        let chunks = chunk(sized(&[3, 25, 3]), 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].len(), 1);
        assert!(chunks[1].is_oversized(10));
        assert!(!chunks[0].is_oversized(10));
    }

    #[test]
    fn test_concatenation_restores_input() {
        let units = sized(&[7, 2, 9, 1, 1, 6, 3, 8, 4]);
        for max in 9..30 {
            let restored: Vec<String> = chunk(units.clone(), max)
                .into_iter()
                .flat_map(|chunk| chunk.units)
                .collect();
            assert_eq!(restored, units);
        }
    }

    #[test]
    fn test_empty_input() {
        let chunks: Vec<Chunk<String>> = chunk(Vec::new(), 10);
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_borrowed_units() {
        let units = sized(&[6, 6]);
        let chunks = chunk(units.iter().collect(), 10);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].units[0], &units[0]);
    }
}
