/// N 维行优先索引迭代器.
///
/// 虽然 `itertools::Itertools::multi_cartesian_product` 也能实现相同的功能,
/// 但它为每个维度各保存一份子迭代器的克隆. 这里只保存当前索引与形状,
/// 每次前进只需一次进位, 因此为性能考虑我们保留该结构.
#[derive(Debug, Clone)]
pub struct IndexIter {
    cur: Vec<usize>,
    shape: Vec<usize>,
    done: bool,
}

impl IndexIter {
    /// 迭代形状为 `shape` 的所有索引. 任一轴长度为 0 时不产生任何元素.
    #[inline]
    pub fn new(shape: &[usize]) -> Self {
        Self {
            cur: vec![0; shape.len()],
            shape: shape.to_vec(),
            done: shape.is_empty() || shape.contains(&0),
        }
    }
}

impl Iterator for IndexIter {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let ret = self.cur.clone();

        // 从最后一维开始进位.
        let mut axis = self.shape.len();
        loop {
            if axis == 0 {
                self.done = true;
                break;
            }
            axis -= 1;
            self.cur[axis] += 1;
            if self.cur[axis] < self.shape[axis] {
                break;
            }
            self.cur[axis] = 0;
        }
        Some(ret)
    }
}

#[cfg(test)]
mod completeness_tests {
    use super::IndexIter;
    use itertools::Itertools;

    fn index_iter_builtin(shape: &[usize]) -> Vec<Vec<usize>> {
        shape
            .iter()
            .map(|&n| 0..n)
            .multi_cartesian_product()
            .collect()
    }

    #[test]
    fn test_index_iter() {
        // 这几个基本例子足以证明正确性了.
        for shape in [vec![3], vec![2, 3], vec![3, 1, 2], vec![2, 2, 2, 2]] {
            assert_eq!(index_iter_builtin(&shape), IndexIter::new(&shape).collect_vec());
        }
    }

    #[test]
    fn test_index_iter_empty() {
        assert_eq!(IndexIter::new(&[4, 0, 2]).count(), 0);
        assert_eq!(IndexIter::new(&[]).count(), 0);
    }
}
