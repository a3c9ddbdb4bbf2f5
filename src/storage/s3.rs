use super::{FileInfo, FileMeta, Storage, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use opendal::{layers::TimeoutLayer, Metakey, Operator};
use std::time::Duration;

/// S3 bucket（可选子目录作为根）
///
/// 凭证与 region 由 AWS 共享配置加载（`AWS_PROFILE` 指定的 profile），
/// 也可以在工作区配置里显式写 region / endpoint。
pub struct S3Storage {
    operator: Operator,
    name: String,
}

impl S3Storage {
    pub fn new(
        bucket: &str,
        folder: Option<&str>,
        region: Option<&str>,
        endpoint: Option<&str>,
    ) -> Result<Self> {
        use opendal::services::S3;

        let mut builder = S3::default().bucket(bucket);

        if let Some(region) = region {
            builder = builder.region(region);
        }

        if let Some(ep) = endpoint {
            builder = builder.endpoint(ep);
        }

        if let Some(folder) = folder {
            builder = builder.root(&format!("/{}/", folder));
        }

        let operator = Operator::new(builder)?
            .layer(
                TimeoutLayer::default()
                    .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                    .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
            )
            .finish();

        let name = format!(
            "s3://{}{}",
            bucket,
            folder.map(|p| format!("/{}", p)).unwrap_or_default()
        );

        Ok(Self { operator, name })
    }

    fn to_meta(meta: &opendal::Metadata) -> FileMeta {
        FileMeta {
            size: meta.content_length(),
            modified_time: meta.last_modified().map_or(0, |t| t.timestamp()),
            is_dir: meta.is_dir(),
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn list_files(&self, prefix: Option<&str>) -> Result<Vec<FileInfo>> {
        let mut files = Vec::new();
        let path = prefix.unwrap_or("");

        let mut lister = self
            .operator
            .lister_with(path)
            .recursive(true)
            .metakey(Metakey::ContentLength | Metakey::LastModified | Metakey::Mode)
            .await?;

        while let Some(entry) = lister.try_next().await? {
            let path_str = entry.path().trim_start_matches('/');

            // 跳过根目录
            if path_str.is_empty() {
                continue;
            }

            let meta = Self::to_meta(entry.metadata());
            files.push(FileInfo {
                path: path_str.to_string(),
                size: meta.size,
                modified_time: meta.modified_time,
                is_dir: meta.is_dir,
            });
        }

        Ok(files)
    }

    async fn stat(&self, path: &str) -> Result<Option<FileMeta>> {
        match self.operator.stat(path).await {
            Ok(meta) => Ok(Some(Self::to_meta(&meta))),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let data = self.operator.read(path).await?;
        Ok(data.to_vec())
    }

    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()> {
        self.operator.write(path, data).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        // S3 删除不存在的对象不会报错
        self.operator.delete(path).await?;
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        // 服务端复制，不经过本地
        self.operator.copy(from, to).await?;
        Ok(())
    }

    async fn check(&self) -> Result<()> {
        self.operator.check().await?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
